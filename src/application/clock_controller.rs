//! The test author's handle on synchronized time
//!
//! `ClockController` owns the logical date. Every change is pushed to the
//! node first and to the page second. The node may refuse (it only moves
//! forward); that is logged and recorded but never fails the call. The page
//! must accept, and a failure there is returned to the test.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::node_clock::{NodeClock, NodeClockError};
use crate::application::page_time_patcher::PageTimePatcher;
use crate::application::ports::{BlockchainNode, BrowserPage};
use crate::config::ClockSettings;
use crate::domain::{CalendarZone, DateInput, LogicalDate, NodeTimestamp};
use crate::infrastructure::log_messages::clock as messages;
use crate::Result;

/// What to do when the node refuses a timestamp that is not in its future
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Leave the node where it is
    #[default]
    Skip,
    /// Mine one block at one second past the node's latest block instead
    ClampForward,
}

/// How the last node synchronization went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSync {
    Synced(NodeTimestamp),
    Clamped {
        requested: NodeTimestamp,
        applied: NodeTimestamp,
    },
    Skipped(NodeClockError),
}

impl NodeSync {
    /// Timestamp the node ended up mining, if any
    pub fn applied(&self) -> Option<NodeTimestamp> {
        match self {
            NodeSync::Synced(ts) => Some(*ts),
            NodeSync::Clamped { applied, .. } => Some(*applied),
            NodeSync::Skipped(_) => None,
        }
    }
}

/// Callback for suites that want to see swallowed node failures
pub type NodeFailureHook = Arc<dyn Fn(&NodeClockError) + Send + Sync>;

/// Keeps the node's block time and the page's `Date` on one logical date
pub struct ClockController {
    node_clock: NodeClock,
    patcher: PageTimePatcher,
    date: tokio::sync::Mutex<LogicalDate>,
    calendar: CalendarZone,
    policy: OrderingPolicy,
    last_sync: Mutex<Option<NodeSync>>,
    on_node_failure: Option<NodeFailureHook>,
}

impl fmt::Debug for ClockController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockController")
            .field("calendar", &self.calendar)
            .field("policy", &self.policy)
            .field("last_sync", &*self.last_sync.lock())
            .finish_non_exhaustive()
    }
}

impl ClockController {
    /// Controller starting at the real current time
    pub fn new(node: Arc<dyn BlockchainNode>, page: Arc<dyn BrowserPage>) -> Self {
        Self {
            node_clock: NodeClock::new(node),
            patcher: PageTimePatcher::new(page),
            date: tokio::sync::Mutex::new(LogicalDate::now()),
            calendar: CalendarZone::default(),
            policy: OrderingPolicy::default(),
            last_sync: Mutex::new(None),
            on_node_failure: None,
        }
    }

    pub fn from_settings(
        node: Arc<dyn BlockchainNode>,
        page: Arc<dyn BrowserPage>,
        settings: &ClockSettings,
    ) -> Self {
        Self::new(node, page)
            .with_calendar(settings.calendar)
            .with_ordering_policy(settings.ordering_policy)
    }

    /// Start from `date` instead of now; nothing is pushed until `set`
    pub fn starting_at(mut self, date: LogicalDate) -> Self {
        self.date = tokio::sync::Mutex::new(date);
        self
    }

    pub fn with_calendar(mut self, calendar: CalendarZone) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_ordering_policy(mut self, policy: OrderingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn on_node_failure(mut self, hook: NodeFailureHook) -> Self {
        self.on_node_failure = Some(hook);
        self
    }

    /// The current logical date
    pub async fn current(&self) -> LogicalDate {
        *self.date.lock().await
    }

    /// Outcome of the most recent node synchronization
    pub fn last_node_sync(&self) -> Option<NodeSync> {
        self.last_sync.lock().clone()
    }

    /// Move the logical date by `days` calendar days and apply it
    pub async fn add_days(&self, days: i64) -> Result<()> {
        let mut date = self.date.lock().await;
        let target = self.calendar.add_days(&date, days)?;
        self.apply(&mut date, target).await?;
        Ok(())
    }

    /// Make `value` the logical date on the node and in the page.
    ///
    /// Returns the date the page now reports, whether or not the node
    /// accepted it.
    pub async fn set(&self, value: impl Into<DateInput>) -> Result<LogicalDate> {
        let target = LogicalDate::try_from(value.into())?;
        let mut date = self.date.lock().await;
        self.apply(&mut date, target).await
    }

    #[instrument(skip_all, fields(target = %target))]
    async fn apply(&self, date: &mut LogicalDate, target: LogicalDate) -> Result<LogicalDate> {
        *date = target;

        let sync = match self.node_clock.advance(&target).await {
            Ok(timestamp) => NodeSync::Synced(timestamp),
            Err(error) => self.recover_node_failure(&target, error).await,
        };
        *self.last_sync.lock() = Some(sync);

        self.patcher.install(&target).await?;

        info!("{}", messages::DATE_APPLIED);
        Ok(target)
    }

    /// Node refusals are reported, never raised. The page still gets the
    /// requested date so UI assertions keep working.
    async fn recover_node_failure(&self, target: &LogicalDate, error: NodeClockError) -> NodeSync {
        warn!(error = %error, "{}", messages::NODE_SYNC_FAILED);
        if let Some(hook) = &self.on_node_failure {
            hook(&error);
        }

        let requested = match &error {
            NodeClockError::TimestampOrdering { requested, .. }
                if self.policy == OrderingPolicy::ClampForward =>
            {
                *requested
            }
            _ => return NodeSync::Skipped(error),
        };

        match self.clamp_forward().await {
            Ok(applied) => {
                info!(
                    requested = %requested,
                    applied = %applied,
                    date = %target,
                    "{}",
                    messages::NODE_CLAMPED
                );
                NodeSync::Clamped { requested, applied }
            }
            Err(clamp_error) => {
                warn!(error = %clamp_error, "{}", messages::NODE_CLAMP_FAILED);
                if let Some(hook) = &self.on_node_failure {
                    hook(&clamp_error);
                }
                NodeSync::Skipped(error)
            }
        }
    }

    async fn clamp_forward(&self) -> std::result::Result<NodeTimestamp, NodeClockError> {
        let latest = self.node_clock.latest_timestamp().await?;
        self.node_clock.advance_to(latest.next()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::page_time_patcher::{PatchApplicationError, PatchStage};
    use crate::application::ports::BrowserError;
    use crate::testing::{InMemoryNode, ScriptedPage};
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const JAN_1_2030_MS: i64 = 1_893_456_000_000;

    fn fixture(node_start: u64) -> (Arc<InMemoryNode>, Arc<ScriptedPage>, ClockController) {
        let node = Arc::new(InMemoryNode::starting_at(node_start));
        let page = Arc::new(ScriptedPage::new());
        let controller =
            ClockController::new(node.clone(), page.clone()).with_calendar(CalendarZone::Utc);
        (node, page, controller)
    }

    fn assert_page_near(page: &ScriptedPage, expected_ms: i64) {
        let drift = page.now_millis() - expected_ms;
        assert!((0..1_000).contains(&drift), "page drifted {drift}ms");
    }

    #[tokio::test]
    async fn test_set_then_add_days_end_to_end() {
        let (node, page, controller) = fixture(1_700_000_000);

        let applied = controller.set("2030-01-01T00:00:00Z").await.unwrap();
        assert_eq!(applied.epoch_millis(), JAN_1_2030_MS);
        assert_eq!(node.latest_timestamp(), 1_893_456_000);
        assert_page_near(&page, JAN_1_2030_MS);

        controller.add_days(1).await.unwrap();
        assert_eq!(node.latest_timestamp(), 1_893_542_400);
        assert_eq!(node.block_number(), 2);
        assert_page_near(&page, JAN_1_2030_MS + 86_400_000);
        assert_eq!(
            controller.current().await,
            LogicalDate::parse("2030-01-02T00:00:00Z").unwrap()
        );
    }

    #[tokio::test]
    async fn test_past_date_still_patches_page() {
        let (node, page, controller) = fixture(1_893_456_000);

        let applied = controller.set("2020-06-01T00:00:00Z").await.unwrap();

        assert_eq!(applied, LogicalDate::parse("2020-06-01T00:00:00Z").unwrap());
        assert_eq!(node.latest_timestamp(), 1_893_456_000);
        assert_eq!(node.block_number(), 0);
        assert_page_near(&page, applied.epoch_millis());
        assert!(matches!(
            controller.last_node_sync(),
            Some(NodeSync::Skipped(NodeClockError::TimestampOrdering { .. }))
        ));
    }

    #[tokio::test]
    async fn test_offline_node_is_not_fatal() {
        let (node, page, controller) = fixture(0);
        node.go_offline();

        controller.set(JAN_1_2030_MS).await.unwrap();

        assert_eq!(page.mocked_epoch(), Some(JAN_1_2030_MS));
    }

    #[tokio::test]
    async fn test_patch_failure_propagates() {
        let (node, page, controller) = fixture(1_700_000_000);
        page.disconnect();

        let err = controller.set("2030-01-01T00:00:00Z").await.unwrap_err();

        match err {
            Error::PatchApplication(patch) => assert_eq!(patch.stage, PatchStage::Register),
            other => panic!("unexpected error: {other:?}"),
        }
        // The node is advanced before the page is touched.
        assert_eq!(node.block_number(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_input_changes_nothing() {
        let (node, page, controller) = fixture(1_700_000_000);
        let before = controller.current().await;

        let err = controller.set("not a date").await.unwrap_err();

        assert!(matches!(err, Error::InvalidDate(_)));
        assert_eq!(controller.current().await, before);
        assert!(node.calls().is_empty());
        assert!(page.init_scripts().is_empty());
    }

    #[tokio::test]
    async fn test_setting_same_date_twice_does_not_drift() {
        let (_node, page, controller) = fixture(1_700_000_000);

        controller.set(JAN_1_2030_MS).await.unwrap();
        controller.set(JAN_1_2030_MS).await.unwrap();

        assert_eq!(page.init_scripts().len(), 2);
        assert_page_near(&page, JAN_1_2030_MS);
    }

    #[tokio::test]
    async fn test_add_days_from_month_end() {
        let (_node, _page, controller) = fixture(1_700_000_000);
        controller.set("2030-01-31T12:00:00Z").await.unwrap();

        controller.add_days(1).await.unwrap();

        assert_eq!(
            controller.current().await,
            LogicalDate::parse("2030-02-01T12:00:00Z").unwrap()
        );
    }

    #[tokio::test]
    async fn test_add_days_starts_from_current_logical_date() {
        let start = LogicalDate::parse("2030-05-10T00:00:00Z").unwrap();
        let (node, _page, controller) = fixture(1_700_000_000);
        let controller = controller.starting_at(start);

        controller.add_days(-3).await.unwrap();

        assert_eq!(
            controller.current().await,
            LogicalDate::parse("2030-05-07T00:00:00Z").unwrap()
        );
        assert_eq!(node.block_number(), 1);
    }

    #[tokio::test]
    async fn test_clamp_forward_mines_one_second_after_latest() {
        let (node, page, controller) = fixture(1_893_456_000);
        let controller = controller.with_ordering_policy(OrderingPolicy::ClampForward);

        let applied = controller.set("2020-01-01T00:00:00Z").await.unwrap();

        assert_eq!(node.latest_timestamp(), 1_893_456_001);
        assert_eq!(node.block_number(), 1);
        assert_eq!(page.mocked_epoch(), Some(applied.epoch_millis()));
        assert_eq!(
            controller.last_node_sync().and_then(|s| s.applied()),
            Some(NodeTimestamp::new(1_893_456_001))
        );
    }

    #[tokio::test]
    async fn test_failure_hook_sees_swallowed_error() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let (_node, _page, controller) = fixture(1_893_456_000);
        let controller = controller.on_node_failure(Arc::new(move |error| {
            assert!(error.is_ordering());
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        controller.set("2000-01-01").await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_evaluate_failure_after_registration_propagates() {
        let (_node, page, controller) = fixture(1_700_000_000);
        page.fail_evaluations_with(BrowserError::Timeout(std::time::Duration::from_secs(5)));

        let err = controller.add_days(1).await.unwrap_err();

        assert!(matches!(
            err,
            Error::PatchApplication(PatchApplicationError {
                stage: PatchStage::Evaluate,
                ..
            })
        ));
    }
}
