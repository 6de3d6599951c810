use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use crate::application::clock_controller::OrderingPolicy;
use crate::domain::CalendarZone;
use crate::infrastructure::test_node::NodeMode;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub node: NodeSettings,
    pub browser: BrowserSettings,
    pub clock: ClockSettings,
    pub wallet: WalletSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeSettings {
    pub rpc_url: String,
    pub mode: NodeMode,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    /// Session created by whatever launched the browser
    pub session_id: Option<String>,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClockSettings {
    pub ordering_policy: OrderingPolicy,
    pub calendar: CalendarZone,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletSettings {
    pub setup_function: String,
    pub login_button: String,
    pub ready_timeout_ms: u64,
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountSettings {
    pub private_key: String,
    pub address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
const DEFAULT_WEBDRIVER_URL: &str = "http://127.0.0.1:9515";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SETUP_FUNCTION: &str = "_setupAccount";
const DEFAULT_LOGIN_BUTTON: &str = "Mock Connector";
const DEFAULT_READY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            mode: NodeMode::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            session_id: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            setup_function: DEFAULT_SETUP_FUNCTION.to_string(),
            login_button: DEFAULT_LOGIN_BUTTON.to_string(),
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            accounts: BTreeMap::new(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Settings {
    /// Load layered settings from `./config` and the environment
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Load layered settings from files in `dir` and the environment.
    ///
    /// Later sources win: built-in defaults, `default.*`, `{DUAL_CLOCK_ENV}.*`,
    /// `local.*`, then `DUAL_CLOCK__SECTION__KEY` variables.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let environment = env::var("DUAL_CLOCK_ENV").unwrap_or_else(|_| "test".to_string());
        let file = |name: &str| File::from(dir.join(name)).required(false);

        let config = Config::builder()
            .set_default("node.rpc_url", DEFAULT_RPC_URL)?
            .set_default("node.mode", "anvil")?
            .set_default("node.request_timeout_ms", DEFAULT_REQUEST_TIMEOUT_MS)?
            .set_default("browser.webdriver_url", DEFAULT_WEBDRIVER_URL)?
            .set_default("browser.request_timeout_ms", DEFAULT_REQUEST_TIMEOUT_MS)?
            .set_default("clock.ordering_policy", "skip")?
            .set_default("clock.calendar", "local")?
            .set_default("wallet.setup_function", DEFAULT_SETUP_FUNCTION)?
            .set_default("wallet.login_button", DEFAULT_LOGIN_BUTTON)?
            .set_default("wallet.ready_timeout_ms", DEFAULT_READY_TIMEOUT_MS)?
            .set_default("wallet.poll_interval_ms", DEFAULT_POLL_INTERVAL_MS)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "compact")?
            .add_source(file("default"))
            .add_source(file(&environment))
            .add_source(file("local"))
            .add_source(Environment::with_prefix("DUAL_CLOCK").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_match_local_anvil_and_chromedriver() {
        let settings = Settings::default();
        assert_eq!(settings.node.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(settings.node.mode, NodeMode::Anvil);
        assert_eq!(settings.browser.webdriver_url, "http://127.0.0.1:9515");
        assert!(settings.browser.session_id.is_none());
        assert_eq!(settings.clock.ordering_policy, OrderingPolicy::Skip);
        assert_eq!(settings.wallet.login_button, "Mock Connector");
    }

    #[test]
    fn test_settings_can_be_loaded_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(dir.path()).unwrap();
        assert_eq!(settings.wallet.setup_function, "_setupAccount");
        assert_eq!(settings.clock.calendar, CalendarZone::Local);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
[node]
rpc_url = "http://node:8545"
mode = "hardhat"

[clock]
ordering_policy = "clamp_forward"
calendar = "utc"

[wallet.accounts.carol]
private_key = "0xabababababababababababababababababababababababababababababababab"
address = "0xcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(dir.path()).unwrap();

        assert_eq!(settings.node.rpc_url, "http://node:8545");
        assert_eq!(settings.node.mode, NodeMode::Hardhat);
        assert_eq!(settings.clock.ordering_policy, OrderingPolicy::ClampForward);
        assert_eq!(settings.clock.calendar, CalendarZone::Utc);
        assert!(settings.wallet.accounts.contains_key("carol"));
        assert_eq!(settings.node.request_timeout_ms, 5_000);
    }
}
