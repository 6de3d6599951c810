//! Domain types for synchronized test time
//!
//! These types model the logical test date, the node's block-time units,
//! the browser patch script and the named wallet accounts. They hold no I/O.

pub mod accounts;
pub mod logical_date;
pub mod node_timestamp;
pub mod patch_script;

pub use accounts::{AccountIdentity, AccountName, AccountRegistry, Address, PrivateKey};
pub use logical_date::{CalendarZone, DateInput, DateParseError, LogicalDate};
pub use node_timestamp::{BlockCount, BlockHeader, NodeTimestamp};
pub use patch_script::PatchScript;
