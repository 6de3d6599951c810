//! Ports to the two external clocks
//!
//! The blockchain test node and the browser are collaborators we drive but do
//! not own. Adapters in `infrastructure` implement these traits over HTTP;
//! `crate::testing` implements them in memory.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{BlockCount, BlockHeader, NodeTimestamp};

/// A blockchain test node that lets us steer block time
#[async_trait]
pub trait BlockchainNode: Send + Sync {
    /// Fix the timestamp of the next mined block
    async fn set_next_block_timestamp(&self, timestamp: NodeTimestamp) -> Result<(), NodeError>;

    /// Mine `blocks` blocks immediately
    async fn mine(&self, blocks: BlockCount) -> Result<(), NodeError>;

    /// Number and timestamp of the most recent block
    async fn latest_block(&self) -> Result<BlockHeader, NodeError>;
}

/// Errors reported by a blockchain node
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// The node understood the request and refused it
    #[error("Node rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Node unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid node response: {0}")]
    InvalidResponse(String),
}

/// A page in a browser under automation
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Run `source` before any page script on every future navigation
    async fn add_init_script(&self, source: &str) -> Result<(), BrowserError>;

    /// Run `script` as a function body in the current page.
    ///
    /// `args` are exposed to the script as `arguments`; the script's return
    /// value (awaited if it is a promise) is handed back as JSON.
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError>;

    /// Click the button whose visible text or accessible label is `name`
    async fn click_button(&self, name: &str) -> Result<(), BrowserError>;
}

/// Errors reported by the browser automation runtime
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
    #[error("Browser session disconnected: {0}")]
    Disconnected(String),

    #[error("Script failed in page: {0}")]
    ScriptFailed(String),

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("Browser did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Invalid browser response: {0}")]
    InvalidResponse(String),
}
