//! Log message constants for infrastructure components
//!
//! This module centralizes the messages logged by the clock, fixtures and
//! adapters so they stay consistent across call sites and tests.

/// Logical date changes
pub mod clock {
    pub const DATE_APPLIED: &str = "Logical date applied to node and page";
    pub const NODE_SYNC_FAILED: &str =
        "Node did not accept the logical date; continuing with the page only";
    pub const NODE_CLAMPED: &str = "Node timestamp clamped to one second after its latest block";
    pub const NODE_CLAMP_FAILED: &str = "Clamping the node timestamp forward failed";
}

/// Fixture lifecycle
pub mod fixtures {
    pub const FIXTURE_READY: &str = "Fixture ready";
    pub const FIXTURE_PROVIDED: &str = "Fixture provided externally";
    pub const TEARING_DOWN: &str = "Tearing down fixture";
    pub const TEARDOWN_FAILED: &str = "Fixture teardown failed";
    pub const SETUP_ABANDONED: &str = "Fixture setup failed; tearing down what was already set up";
}

/// Mock wallet
pub mod wallet {
    pub const CONNECTED: &str = "Mock wallet connected";
    pub const WAITING_FOR_SETUP_HOOK: &str = "Waiting for the page to expose the wallet setup hook";
}

/// Outbound HTTP to the node and the browser driver
pub mod transport {
    pub const RPC_CALL: &str = "JSON-RPC call";
    pub const RPC_REJECTED: &str = "JSON-RPC call rejected by node";
    pub const WEBDRIVER_COMMAND: &str = "WebDriver command";
    pub const WEBDRIVER_ERROR: &str = "WebDriver command failed";
}

/// Logging setup
pub mod telemetry {
    pub const ALREADY_INITIALIZED: &str = "Tracing subscriber already installed; keeping it";
    pub const UNKNOWN_FORMAT: &str = "Unknown log format; using compact";
}
