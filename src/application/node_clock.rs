//! Advancing the blockchain node's block time
//!
//! A node only accepts strictly increasing block timestamps. `NodeClock`
//! makes a single attempt per call and turns the node's refusal into a
//! typed error; deciding what to do about it is the caller's job.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::application::ports::{BlockchainNode, NodeError};
use crate::domain::{BlockCount, LogicalDate, NodeTimestamp};

// anvil: "Timestamp error: 5 is lower than or equal to previous block's timestamp"
// hardhat: "Timestamp 5 is lower than or equal to previous block's timestamp 9"
static ORDERING_REJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)timestamp( error|.*\b(lower|less|smaller|earlier|older)\b)")
        .expect("ordering rejection pattern is valid")
});

/// Errors advancing the node clock
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeClockError {
    /// The node requires a timestamp after its current one
    #[error("Node refused timestamp {requested}: {message}")]
    TimestampOrdering {
        requested: NodeTimestamp,
        message: String,
    },

    #[error("{date} predates the Unix epoch and has no block timestamp")]
    Unrepresentable { date: LogicalDate },

    #[error(transparent)]
    Node(#[from] NodeError),
}

impl NodeClockError {
    pub fn is_ordering(&self) -> bool {
        matches!(self, NodeClockError::TimestampOrdering { .. })
    }

    fn classify(requested: NodeTimestamp, error: NodeError) -> Self {
        match error {
            NodeError::Rejected { message, .. } if ORDERING_REJECTION.is_match(&message) => {
                NodeClockError::TimestampOrdering { requested, message }
            }
            other => NodeClockError::Node(other),
        }
    }
}

/// Moves the node's block time forward to a logical date
#[derive(Clone)]
pub struct NodeClock {
    node: Arc<dyn BlockchainNode>,
}

impl NodeClock {
    pub fn new(node: Arc<dyn BlockchainNode>) -> Self {
        Self { node }
    }

    /// Commit `date` as the timestamp of a newly mined block
    pub async fn advance(&self, date: &LogicalDate) -> Result<NodeTimestamp, NodeClockError> {
        let timestamp = date
            .node_timestamp()
            .ok_or(NodeClockError::Unrepresentable { date: *date })?;
        self.advance_to(timestamp).await
    }

    /// Set the next block timestamp, then mine the one block that commits it
    #[instrument(skip_all, fields(timestamp = %timestamp))]
    pub async fn advance_to(
        &self,
        timestamp: NodeTimestamp,
    ) -> Result<NodeTimestamp, NodeClockError> {
        self.node
            .set_next_block_timestamp(timestamp)
            .await
            .map_err(|e| NodeClockError::classify(timestamp, e))?;
        self.node.mine(BlockCount::one()).await?;

        debug!("node clock advanced");
        Ok(timestamp)
    }

    /// Timestamp of the node's most recent block
    pub async fn latest_timestamp(&self) -> Result<NodeTimestamp, NodeClockError> {
        Ok(self.node.latest_block().await?.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryNode, NodeCall};

    fn date(text: &str) -> LogicalDate {
        LogicalDate::parse(text).unwrap()
    }

    #[tokio::test]
    async fn test_advance_sets_timestamp_then_mines_one_block() {
        let node = Arc::new(InMemoryNode::starting_at(1_700_000_000));
        let clock = NodeClock::new(node.clone());

        let ts = clock.advance(&date("2030-01-01T00:00:00Z")).await.unwrap();

        assert_eq!(ts.as_secs(), 1_893_456_000);
        assert_eq!(node.latest_timestamp(), 1_893_456_000);
        assert_eq!(node.block_number(), 1);
        assert_eq!(
            node.calls(),
            vec![
                NodeCall::SetNextTimestamp(1_893_456_000),
                NodeCall::Mine(1)
            ]
        );
    }

    #[tokio::test]
    async fn test_advance_floors_milliseconds() {
        let node = Arc::new(InMemoryNode::starting_at(1_700_000_000));
        let clock = NodeClock::new(node.clone());

        clock
            .advance(&date("2030-01-01T00:00:00.999Z"))
            .await
            .unwrap();

        assert_eq!(node.latest_timestamp(), 1_893_456_000);
    }

    #[tokio::test]
    async fn test_non_increasing_timestamp_is_an_ordering_error() {
        let node = Arc::new(InMemoryNode::starting_at(1_893_456_000));
        let clock = NodeClock::new(node.clone());

        let err = clock
            .advance(&date("2030-01-01T00:00:00Z"))
            .await
            .unwrap_err();

        assert!(err.is_ordering());
        assert_eq!(node.block_number(), 0);
        assert_eq!(
            node.calls(),
            vec![NodeCall::SetNextTimestamp(1_893_456_000)]
        );
    }

    #[tokio::test]
    async fn test_pre_epoch_date_never_reaches_the_node() {
        let node = Arc::new(InMemoryNode::starting_at(0));
        let clock = NodeClock::new(node.clone());

        let err = clock
            .advance(&date("1969-12-31T23:59:59Z"))
            .await
            .unwrap_err();

        assert!(matches!(err, NodeClockError::Unrepresentable { .. }));
        assert!(node.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_an_ordering_error() {
        let node = Arc::new(InMemoryNode::starting_at(0));
        node.go_offline();
        let clock = NodeClock::new(node);

        let err = clock
            .advance(&date("2030-01-01T00:00:00Z"))
            .await
            .unwrap_err();

        assert!(matches!(err, NodeClockError::Node(NodeError::Unavailable(_))));
    }

    #[test]
    fn test_classifies_anvil_and_hardhat_messages() {
        let requested = NodeTimestamp::new(5);
        for message in [
            "Timestamp error: 5 is lower than or equal to previous block's timestamp",
            "Timestamp 5 is lower than or equal to previous block's timestamp 9",
        ] {
            let error = NodeError::Rejected {
                code: -32000,
                message: message.to_string(),
            };
            assert!(NodeClockError::classify(requested, error).is_ordering());
        }

        let unrelated = NodeError::Rejected {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert!(!NodeClockError::classify(requested, unrelated).is_ordering());
    }
}
