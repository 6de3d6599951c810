//! Dual Clock - synchronized test time for end-to-end tests
//!
//! Keeps a local blockchain test node's block time and a browser page's
//! `Date` on one logical date that the test controls, and composes that
//! control with a mock wallet into per-test fixtures.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod telemetry;
pub mod testing;

pub use application::{ClockController, FixtureScope, MockWallet, OrderingPolicy, TestFixtures};
pub use config::Settings;
pub use domain::{CalendarZone, DateInput, LogicalDate};
pub use error::{Error, Result};
