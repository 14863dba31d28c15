//! Chain module - the network boundary used by the submission pipeline
//!
//! The pipeline only talks to the chain through [`NetworkClient`], so stage
//! logic can be exercised against mocks and the JSON-RPC provider stays a thin
//! adapter.

pub mod provider;

pub use provider::RpcNetworkClient;

use crate::error::GatewayResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// Network operations needed to build, submit and observe transactions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Chain ID reported by the node
    async fn chain_id(&self) -> GatewayResult<u64>;

    /// Transaction count of `account`, optionally counting the mempool
    async fn get_transaction_count(
        &self,
        account: Address,
        include_pending: bool,
    ) -> GatewayResult<u64>;

    /// Gas the node expects `tx` to consume
    async fn estimate_gas(&self, tx: TypedTransaction) -> GatewayResult<U256>;

    /// Base fee of the latest block
    async fn base_fee_per_gas(&self) -> GatewayResult<U256>;

    /// Submit a signed, RLP-encoded transaction and return its hash
    async fn send_raw_transaction(&self, raw: Bytes) -> GatewayResult<H256>;

    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> GatewayResult<Option<TransactionReceipt>>;

    /// Execute a read-only call against the latest state
    async fn call(&self, tx: TypedTransaction) -> GatewayResult<Bytes>;
}
