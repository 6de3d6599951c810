//! Mocked wallet connection
//!
//! The application under test exposes a setup hook (by default
//! `window._setupAccount`) that configures its mock connector with a private
//! key. Connecting an account means waiting for that hook, calling it, then
//! running the app's login ritual, which here is clicking the mock
//! connector's button.

use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

use crate::application::ports::{BrowserError, BrowserPage};
use crate::config::WalletSettings;
use crate::domain::{AccountIdentity, AccountName, AccountRegistry, Address, PrivateKey};
use crate::infrastructure::log_messages::wallet as messages;

/// Truthy once `window[arguments[0]]` is callable
pub const SETUP_READY_SCRIPT: &str = r#"return typeof window[arguments[0]] === "function";"#;

/// Calls `window[arguments[0]](privateKey, features)`
pub const SETUP_CALL_SCRIPT: &str =
    "return window[arguments[0]](arguments[1], arguments[2] ?? undefined);";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletSetupError {
    #[error("Unknown account {0:?}")]
    UnknownAccount(String),

    #[error("Configured account {name:?} is invalid: {reason}")]
    InvalidAccount { name: String, reason: String },

    #[error("Page never exposed window.{function} within {waited:?}")]
    SetupHookMissing { function: String, waited: Duration },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Wallet stand-in that logs a named test account into the page
pub struct MockWallet {
    page: Arc<dyn BrowserPage>,
    accounts: AccountRegistry,
    settings: WalletSettings,
    address: RwLock<Option<Address>>,
}

impl MockWallet {
    pub fn new(
        page: Arc<dyn BrowserPage>,
        settings: WalletSettings,
    ) -> Result<Self, WalletSetupError> {
        let accounts = AccountRegistry::with_accounts(configured_accounts(&settings)?);
        Ok(Self {
            page,
            accounts,
            settings,
            address: RwLock::new(None),
        })
    }

    /// Address of the connected account, if any
    pub fn address(&self) -> Option<Address> {
        self.address.read().clone()
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    /// Connect `name` through the page's mock connector.
    ///
    /// `features` is passed through untouched to the setup hook.
    #[instrument(skip(self, features))]
    pub async fn connect(&self, name: &str, features: Option<Value>) -> Result<(), WalletSetupError> {
        let identity = self
            .accounts
            .get(name)
            .cloned()
            .ok_or_else(|| WalletSetupError::UnknownAccount(name.to_string()))?;

        *self.address.write() = Some(identity.address.clone());

        self.setup(&identity, features).await?;
        self.login().await?;

        info!(address = %identity.address, "{}", messages::CONNECTED);
        Ok(())
    }

    async fn setup(
        &self,
        identity: &AccountIdentity,
        features: Option<Value>,
    ) -> Result<(), WalletSetupError> {
        self.wait_for_setup_hook().await?;
        self.page
            .evaluate(
                SETUP_CALL_SCRIPT,
                vec![
                    json!(self.settings.setup_function),
                    json!(identity.private_key.as_ref()),
                    features.unwrap_or(Value::Null),
                ],
            )
            .await?;
        Ok(())
    }

    async fn login(&self) -> Result<(), WalletSetupError> {
        self.page.click_button(&self.settings.login_button).await?;
        Ok(())
    }

    async fn wait_for_setup_hook(&self) -> Result<(), WalletSetupError> {
        let timeout = Duration::from_millis(self.settings.ready_timeout_ms);
        let poll = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        let started = Instant::now();

        loop {
            let ready = self
                .page
                .evaluate(SETUP_READY_SCRIPT, vec![json!(self.settings.setup_function)])
                .await?;
            if ready.as_bool().unwrap_or(false) {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(WalletSetupError::SetupHookMissing {
                    function: self.settings.setup_function.clone(),
                    waited: timeout,
                });
            }
            debug!("{}", messages::WAITING_FOR_SETUP_HOOK);
            sleep(poll).await;
        }
    }
}

fn configured_accounts(settings: &WalletSettings) -> Result<Vec<AccountIdentity>, WalletSetupError> {
    settings
        .accounts
        .iter()
        .map(|(name, account)| {
            let invalid = |reason: &str| WalletSetupError::InvalidAccount {
                name: name.clone(),
                reason: reason.to_string(),
            };
            Ok(AccountIdentity {
                name: AccountName::try_new(name.clone()).map_err(|_| invalid("bad name"))?,
                private_key: PrivateKey::try_new(account.private_key.clone())
                    .map_err(|_| invalid("private key must be 0x followed by 64 hex digits"))?,
                address: Address::try_new(account.address.clone())
                    .map_err(|_| invalid("address must be 0x followed by 40 hex digits"))?,
            })
        })
        .collect()
}
