//! Property-based tests for the clock's invariants

use dual_clock::domain::NodeTimestamp;
use dual_clock::testing::{InMemoryNode, ScriptedPage};
use dual_clock::{CalendarZone, ClockController, LogicalDate};
use proptest::prelude::*;
use std::sync::Arc;

const NODE_START: u64 = 1_700_000_000;
const YEAR_2200_MS: i64 = 7_258_118_400_000;

fn controller() -> (Arc<InMemoryNode>, Arc<ScriptedPage>, ClockController) {
    let node = Arc::new(InMemoryNode::starting_at(NODE_START));
    let page = Arc::new(ScriptedPage::new());
    let controller =
        ClockController::new(node.clone(), page.clone()).with_calendar(CalendarZone::Utc);
    (node, page, controller)
}

fn forward_millis() -> impl Strategy<Value = i64> {
    ((NODE_START as i64 + 1) * 1_000)..YEAR_2200_MS
}

fn past_millis() -> impl Strategy<Value = i64> {
    0..=(NODE_START as i64 * 1_000 + 999)
}

proptest! {
    #[test]
    fn prop_forward_set_floors_to_seconds_and_mines_once(millis in forward_millis()) {
        let (node, page, controller) = controller();

        let applied = tokio_test::block_on(controller.set(millis)).unwrap();

        prop_assert_eq!(applied.epoch_millis(), millis);
        prop_assert_eq!(node.latest_timestamp(), (millis / 1_000) as u64);
        prop_assert_eq!(node.block_number(), 1);
        prop_assert_eq!(page.mocked_epoch(), Some(millis));
    }

    #[test]
    fn prop_past_set_leaves_node_alone(millis in past_millis()) {
        let (node, page, controller) = controller();

        let applied = tokio_test::block_on(controller.set(millis)).unwrap();

        prop_assert_eq!(applied.epoch_millis(), millis);
        prop_assert_eq!(node.latest_timestamp(), NODE_START);
        prop_assert_eq!(node.block_number(), 0);
        prop_assert_eq!(page.mocked_epoch(), Some(millis));
    }

    #[test]
    fn prop_repeated_set_does_not_stack(millis in forward_millis(), repeats in 2usize..5) {
        let (_node, page, controller) = controller();

        for _ in 0..repeats {
            tokio_test::block_on(controller.set(millis)).unwrap();
        }

        prop_assert_eq!(page.mocked_epoch(), Some(millis));
        prop_assert_eq!(page.init_scripts().len(), repeats);
        let drift = page.now_millis() - millis;
        prop_assert!((0..1_000).contains(&drift));
    }

    #[test]
    fn prop_utc_add_days_is_whole_days(
        millis in forward_millis(),
        days in -3_650i64..3_650,
    ) {
        let (_node, _page, controller) = controller();
        tokio_test::block_on(controller.set(millis)).unwrap();

        tokio_test::block_on(controller.add_days(days)).unwrap();

        let current = tokio_test::block_on(controller.current());
        prop_assert_eq!(current.epoch_millis(), millis + days * 86_400_000);
    }

    #[test]
    fn prop_node_timestamp_is_floor_of_millis(millis in 0i64..YEAR_2200_MS) {
        let date = LogicalDate::from_epoch_millis(millis).unwrap();
        let timestamp = date.node_timestamp().unwrap();

        prop_assert_eq!(timestamp, NodeTimestamp::new((millis / 1_000) as u64));
        prop_assert!(timestamp.as_secs() as i64 * 1_000 <= millis);
        prop_assert!(millis < (timestamp.as_secs() as i64 + 1) * 1_000);
    }

    #[test]
    fn prop_pre_epoch_has_no_node_timestamp(millis in -1_000_000_000_000i64..0) {
        let date = LogicalDate::from_epoch_millis(millis).unwrap();
        prop_assert!(date.node_timestamp().is_none());
    }
}
