//! In-memory stand-ins for the node and the browser
//!
//! `InMemoryNode` enforces the one rule that matters to the clock: block
//! timestamps strictly increase. `ScriptedPage` understands the scripts this
//! crate sends (the `Date` patch and the wallet hooks) well enough to report
//! what a real page would, without a browser.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Instant;

use crate::application::ports::{BlockchainNode, BrowserError, BrowserPage, NodeError};
use crate::application::wallet::{SETUP_CALL_SCRIPT, SETUP_READY_SCRIPT};
use crate::domain::{BlockCount, BlockHeader, NodeTimestamp, PatchScript};

/// A request the node received, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCall {
    SetNextTimestamp(u64),
    Mine(u64),
    LatestBlock,
}

#[derive(Debug)]
struct NodeState {
    number: u64,
    timestamp: u64,
    pending: Option<u64>,
    calls: Vec<NodeCall>,
    offline: bool,
}

/// A test node that mines instantly and rejects non-increasing timestamps
#[derive(Debug)]
pub struct InMemoryNode {
    state: Mutex<NodeState>,
}

impl InMemoryNode {
    /// Genesis block (number 0) at `timestamp`
    pub fn starting_at(timestamp: u64) -> Self {
        Self {
            state: Mutex::new(NodeState {
                number: 0,
                timestamp,
                pending: None,
                calls: Vec::new(),
                offline: false,
            }),
        }
    }

    pub fn latest_timestamp(&self) -> u64 {
        self.state.lock().timestamp
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().number
    }

    pub fn calls(&self) -> Vec<NodeCall> {
        self.state.lock().calls.clone()
    }

    /// Every later request fails as if the node were unreachable
    pub fn go_offline(&self) {
        self.state.lock().offline = true;
    }

    fn record(&self, call: NodeCall) -> Result<parking_lot::MutexGuard<'_, NodeState>, NodeError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.offline {
            return Err(NodeError::Unavailable("connection refused".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl BlockchainNode for InMemoryNode {
    async fn set_next_block_timestamp(&self, timestamp: NodeTimestamp) -> Result<(), NodeError> {
        let requested = timestamp.as_secs();
        let mut state = self.record(NodeCall::SetNextTimestamp(requested))?;
        if requested <= state.timestamp {
            return Err(NodeError::Rejected {
                code: -32000,
                message: format!(
                    "Timestamp error: {requested} is lower than or equal to previous block's timestamp"
                ),
            });
        }
        state.pending = Some(requested);
        Ok(())
    }

    async fn mine(&self, blocks: BlockCount) -> Result<(), NodeError> {
        let count = blocks.into_inner();
        let mut state = self.record(NodeCall::Mine(count))?;
        for _ in 0..count {
            let next = state.pending.take().unwrap_or(state.timestamp + 1);
            state.timestamp = next;
            state.number += 1;
        }
        Ok(())
    }

    async fn latest_block(&self) -> Result<BlockHeader, NodeError> {
        let state = self.record(NodeCall::LatestBlock)?;
        Ok(BlockHeader {
            number: state.number,
            timestamp: NodeTimestamp::new(state.timestamp),
        })
    }
}

#[derive(Debug)]
struct PageState {
    init_scripts: Vec<String>,
    evaluations: Vec<(String, Vec<Value>)>,
    /// Mocked epoch and the real instant the patch last ran
    installed: Option<(i64, Instant)>,
    globals: HashSet<String>,
    buttons: HashSet<String>,
    clicked: Vec<String>,
    disconnected: bool,
    evaluation_failure: Option<BrowserError>,
}

/// A browser page that simulates the effect of the scripts it is given
#[derive(Debug)]
pub struct ScriptedPage {
    state: Mutex<PageState>,
}

impl Default for ScriptedPage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPage {
    /// A blank page with a "Mock Connector" button
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PageState {
                init_scripts: Vec::new(),
                evaluations: Vec::new(),
                installed: None,
                globals: HashSet::new(),
                buttons: HashSet::from(["Mock Connector".to_string()]),
                clicked: Vec::new(),
                disconnected: false,
                evaluation_failure: None,
            }),
        }
    }

    /// Scripts registered to run before each navigation, oldest first
    pub fn init_scripts(&self) -> Vec<String> {
        self.state.lock().init_scripts.clone()
    }

    /// Scripts that ran successfully in the current page
    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.state
            .lock()
            .evaluations
            .iter()
            .map(|(script, _)| script.clone())
            .collect()
    }

    pub fn evaluations(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().evaluations.clone()
    }

    pub fn clicked_buttons(&self) -> Vec<String> {
        self.state.lock().clicked.clone()
    }

    /// Epoch the page's `Date` is pinned to, if patched
    pub fn mocked_epoch(&self) -> Option<i64> {
        self.state.lock().installed.map(|(epoch, _)| epoch)
    }

    /// What `Date.now()` returns in the page
    pub fn now_millis(&self) -> i64 {
        match self.state.lock().installed {
            Some((epoch, at)) => epoch + elapsed_millis(at),
            None => Utc::now().timestamp_millis(),
        }
    }

    /// What `new Date(...)` yields: explicit arguments are left alone
    pub fn construct_date(&self, explicit_millis: Option<i64>) -> i64 {
        explicit_millis.unwrap_or_else(|| self.now_millis())
    }

    /// Navigate to the same URL: in-page state is lost and every registered
    /// init script runs again, in registration order
    pub fn reload(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.installed = state
            .init_scripts
            .iter()
            .filter_map(|script| PatchScript::parse_epoch(script))
            .last()
            .map(|epoch| (epoch, now));
    }

    /// Make `window[name]` a function
    pub fn define_global(&self, name: &str) {
        self.state.lock().globals.insert(name.to_string());
    }

    pub fn remove_button(&self, name: &str) {
        self.state.lock().buttons.remove(name);
    }

    /// Every later call fails as if the browser had closed
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    /// Every later evaluation fails with `error`; registration still works
    pub fn fail_evaluations_with(&self, error: BrowserError) {
        self.state.lock().evaluation_failure = Some(error);
    }
}

fn elapsed_millis(since: Instant) -> i64 {
    i64::try_from(since.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn disconnected() -> BrowserError {
    BrowserError::Disconnected("target window already closed".to_string())
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn add_init_script(&self, source: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(disconnected());
        }
        state.init_scripts.push(source.to_string());
        Ok(())
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(disconnected());
        }
        if let Some(error) = &state.evaluation_failure {
            return Err(error.clone());
        }

        let function = args.first().and_then(Value::as_str).map(str::to_string);
        state.evaluations.push((script.to_string(), args));

        if let Some(epoch) = PatchScript::parse_epoch(script) {
            state.installed = Some((epoch, Instant::now()));
            return Ok(Value::Null);
        }

        match script {
            SETUP_READY_SCRIPT => Ok(Value::Bool(
                function.is_some_and(|name| state.globals.contains(&name)),
            )),
            SETUP_CALL_SCRIPT => match function {
                Some(name) if state.globals.contains(&name) => Ok(Value::Null),
                other => Err(BrowserError::ScriptFailed(format!(
                    "window[{other:?}] is not a function"
                ))),
            },
            _ => Ok(Value::Null),
        }
    }

    async fn click_button(&self, name: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(disconnected());
        }
        if !state.buttons.contains(name) {
            return Err(BrowserError::ElementNotFound(format!("button {name:?}")));
        }
        state.clicked.push(name.to_string());
        Ok(())
    }
}
