use thiserror::Error;

use crate::application::fixtures::FixtureError;
use crate::application::page_time_patcher::PatchApplicationError;
use crate::application::ports::{BrowserError, NodeError};
use crate::application::wallet::WalletSetupError;
use crate::domain::DateParseError;

/// Errors surfaced to test code
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid date: {0}")]
    InvalidDate(#[from] DateParseError),

    #[error(transparent)]
    PatchApplication(#[from] PatchApplicationError),

    #[error("Wallet setup failed: {0}")]
    WalletSetup(#[from] WalletSetupError),

    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl Error {
    /// Whether the browser went away, the one failure a test cannot work around
    pub fn is_disconnected(&self) -> bool {
        matches!(
            self,
            Error::Browser(BrowserError::Disconnected(_))
                | Error::PatchApplication(PatchApplicationError {
                    source: BrowserError::Disconnected(_),
                    ..
                })
                | Error::WalletSetup(WalletSetupError::Browser(BrowserError::Disconnected(_)))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
