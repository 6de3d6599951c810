//! JSON-RPC adapter for local EVM test nodes (anvil, hardhat)

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::instrument;

use super::json_rpc::{JsonRpcClient, RpcError};
use crate::application::ports::{BlockchainNode, NodeError};
use crate::config::NodeSettings;
use crate::domain::{BlockCount, BlockHeader, NodeTimestamp};

/// Which node implementation is listening; they disagree on the mining method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    #[default]
    #[display("anvil")]
    Anvil,
    #[display("hardhat")]
    Hardhat,
}

impl NodeMode {
    pub fn mine_method(&self) -> &'static str {
        match self {
            NodeMode::Anvil => "anvil_mine",
            NodeMode::Hardhat => "hardhat_mine",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    number: String,
    timestamp: String,
}

/// `BlockchainNode` over a node's HTTP JSON-RPC endpoint
pub struct TestNodeClient {
    rpc: JsonRpcClient,
    mode: NodeMode,
}

impl TestNodeClient {
    pub fn new(rpc_url: &str, mode: NodeMode, timeout: Duration) -> Result<Self, NodeError> {
        let rpc = JsonRpcClient::new(rpc_url, timeout).map_err(node_error)?;
        Ok(Self { rpc, mode })
    }

    pub fn from_settings(settings: &NodeSettings) -> Result<Self, NodeError> {
        Self::new(
            &settings.rpc_url,
            settings.mode,
            Duration::from_millis(settings.request_timeout_ms),
        )
    }

    pub fn mode(&self) -> NodeMode {
        self.mode
    }
}

#[async_trait]
impl BlockchainNode for TestNodeClient {
    #[instrument(skip(self), fields(mode = %self.mode))]
    async fn set_next_block_timestamp(&self, timestamp: NodeTimestamp) -> Result<(), NodeError> {
        self.rpc
            .call::<_, Value>("evm_setNextBlockTimestamp", json!([timestamp.to_quantity()]))
            .await
            .map_err(node_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(mode = %self.mode))]
    async fn mine(&self, blocks: BlockCount) -> Result<(), NodeError> {
        // Second parameter is the interval between mined blocks.
        self.rpc
            .call::<_, Value>(self.mode.mine_method(), json!([blocks.to_quantity(), "0x0"]))
            .await
            .map_err(node_error)?;
        Ok(())
    }

    async fn latest_block(&self) -> Result<BlockHeader, NodeError> {
        let block: Option<RawBlock> = self
            .rpc
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await
            .map_err(node_error)?;
        let block =
            block.ok_or_else(|| NodeError::InvalidResponse("no latest block".to_string()))?;

        Ok(BlockHeader {
            number: parse_quantity(&block.number)?,
            timestamp: NodeTimestamp::new(parse_quantity(&block.timestamp)?),
        })
    }
}

fn node_error(error: RpcError) -> NodeError {
    match error {
        RpcError::Remote { code, message } => NodeError::Rejected { code, message },
        RpcError::Http(http) => NodeError::Unavailable(http.to_string()),
        RpcError::Malformed(reason) => NodeError::InvalidResponse(reason),
    }
}

fn parse_quantity(quantity: &str) -> Result<u64, NodeError> {
    quantity
        .strip_prefix("0x")
        .and_then(|digits| u64::from_str_radix(digits, 16).ok())
        .ok_or_else(|| NodeError::InvalidResponse(format!("bad quantity {quantity:?}")))
}
