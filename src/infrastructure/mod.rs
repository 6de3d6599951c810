//! Infrastructure layer
//!
//! HTTP adapters for the two external clocks: the test node's JSON-RPC
//! endpoint and the browser's WebDriver session.

pub mod http;
pub mod json_rpc;
pub mod log_messages;
pub mod test_node;
pub mod webdriver;

pub use test_node::{NodeMode, TestNodeClient};
pub use webdriver::WebDriverPage;
