//! Named test accounts for the mocked wallet
//!
//! Tests talk about "alice" and "bob" rather than raw addresses. The default
//! registry maps those names to the first two accounts every anvil and
//! hardhat node pre-funds.

use nutype::nutype;
use std::collections::BTreeMap;
use std::fmt;

/// Symbolic account name used in test bodies
#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, len_char_max = 64, regex = r"^[a-z][a-z0-9_-]*$"),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct AccountName(String);

/// 20-byte hex account address
#[nutype(
    validate(regex = r"^0x[0-9a-fA-F]{40}$"),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct Address(String);

/// 32-byte hex private key (secured)
#[nutype(
    validate(regex = r"^0x[0-9a-fA-F]{64}$"),
    derive(Clone, PartialEq, Eq, Serialize, Deserialize, AsRef)
)]
pub struct PrivateKey(String);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(***)")
    }
}

/// Name, key and address of one test account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub name: AccountName,
    pub private_key: PrivateKey,
    pub address: Address,
}

// Keys published by anvil and hardhat for their default mnemonic.
const DEFAULT_ACCOUNTS: [(&str, &str, &str); 2] = [
    (
        "alice",
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
    ),
    (
        "bob",
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
        "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
    ),
];

/// Immutable lookup from account name to identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRegistry {
    accounts: BTreeMap<AccountName, AccountIdentity>,
}

impl Default for AccountRegistry {
    fn default() -> Self {
        let accounts = DEFAULT_ACCOUNTS
            .iter()
            .map(|(name, key, address)| {
                let identity = AccountIdentity {
                    name: AccountName::try_new(name.to_string())
                        .expect("default account name is valid"),
                    private_key: PrivateKey::try_new(key.to_string())
                        .expect("default private key is valid"),
                    address: Address::try_new(address.to_string())
                        .expect("default address is valid"),
                };
                (identity.name.clone(), identity)
            })
            .collect();

        Self { accounts }
    }
}

impl AccountRegistry {
    /// Registry with alice and bob plus `extra`, which wins on name clashes
    pub fn with_accounts(extra: impl IntoIterator<Item = AccountIdentity>) -> Self {
        let mut registry = Self::default();
        for identity in extra {
            registry.accounts.insert(identity.name.clone(), identity);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&AccountIdentity> {
        let name = AccountName::try_new(name.to_string()).ok()?;
        self.accounts.get(&name)
    }

    pub fn names(&self) -> impl Iterator<Item = &AccountName> {
        self.accounts.keys()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
