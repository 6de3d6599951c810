//! Application services
//!
//! Orchestration of the node clock, the page clock and the mock wallet,
//! plus the fixtures that wire them together for a test.

pub mod clock_controller;
pub mod composition;
pub mod fixtures;
pub mod node_clock;
pub mod page_time_patcher;
pub mod ports;
pub mod wallet;

pub use clock_controller::{ClockController, NodeFailureHook, NodeSync, OrderingPolicy};
pub use composition::{DateFixture, NodeFixture, PageFixture, TestFixtures, WalletFixture};
pub use fixtures::{Fixture, FixtureError, FixtureScope};
pub use node_clock::{NodeClock, NodeClockError};
pub use page_time_patcher::{PageTimePatcher, PatchApplicationError, PatchStage};
pub use ports::{BlockchainNode, BrowserError, BrowserPage, NodeError};
pub use wallet::{MockWallet, WalletSetupError};
