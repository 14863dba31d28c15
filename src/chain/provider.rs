//! JSON-RPC chain provider with bounded request times

use super::NetworkClient;
use crate::error::{GatewayError, GatewayResult};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockId, BlockNumber, Bytes, TransactionReceipt, H256, U256};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// HTTP provider wrapper that classifies failures for the pipeline
pub struct RpcNetworkClient {
    provider: Provider<Http>,
    /// Upper bound for a single request
    request_timeout: Duration,
}

impl RpcNetworkClient {
    /// Create a new provider for `rpc_url`
    pub fn new(rpc_url: &str, request_timeout: Duration) -> GatewayResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| GatewayError::Config(format!("Invalid RPC URL {}: {}", rpc_url, e)))?
            .interval(Duration::from_millis(500));

        debug!("Created HTTP provider for {}", rpc_url);

        Ok(Self {
            provider,
            request_timeout,
        })
    }

    /// Run a provider request, mapping transport problems to `NetworkUnavailable`
    async fn request<T, F>(&self, operation: &str, fut: F) -> GatewayResult<T>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("{} failed: {}", operation, e);
                Err(GatewayError::NetworkUnavailable(format!(
                    "{} failed: {}",
                    operation, e
                )))
            }
            Err(_) => {
                warn!("{} timed out after {:?}", operation, self.request_timeout);
                Err(GatewayError::NetworkUnavailable(format!(
                    "{} timed out after {:?}",
                    operation, self.request_timeout
                )))
            }
        }
    }
}

#[async_trait]
impl NetworkClient for RpcNetworkClient {
    async fn chain_id(&self) -> GatewayResult<u64> {
        let id = self
            .request("eth_chainId", self.provider.get_chainid())
            .await?;
        Ok(id.as_u64())
    }

    async fn get_transaction_count(
        &self,
        account: Address,
        include_pending: bool,
    ) -> GatewayResult<u64> {
        let block = if include_pending {
            BlockNumber::Pending
        } else {
            BlockNumber::Latest
        };

        let count = self
            .request(
                "eth_getTransactionCount",
                self.provider
                    .get_transaction_count(account, Some(BlockId::Number(block))),
            )
            .await?;

        Ok(count.as_u64())
    }

    async fn estimate_gas(&self, tx: TypedTransaction) -> GatewayResult<U256> {
        match timeout(self.request_timeout, self.provider.estimate_gas(&tx, None)).await {
            Ok(Ok(gas)) => Ok(gas),
            Ok(Err(e)) => Err(estimate_failure(e)),
            Err(_) => Err(GatewayError::NetworkUnavailable(format!(
                "eth_estimateGas timed out after {:?}",
                self.request_timeout
            ))),
        }
    }

    async fn base_fee_per_gas(&self) -> GatewayResult<U256> {
        let block = self
            .request("eth_getBlockByNumber", self.provider.get_block(BlockNumber::Latest))
            .await?
            .ok_or_else(|| GatewayError::NetworkUnavailable("No latest block".to_string()))?;

        block.base_fee_per_gas.ok_or_else(|| {
            GatewayError::InvalidGasParameters("Latest block carries no base fee".to_string())
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> GatewayResult<H256> {
        let send = async {
            self.provider
                .send_raw_transaction(raw)
                .await
                .map(|pending| pending.tx_hash())
        };

        match timeout(self.request_timeout, send).await {
            Ok(Ok(tx_hash)) => Ok(tx_hash),
            Ok(Err(e)) => Err(broadcast_failure(e)),
            Err(_) => Err(GatewayError::BroadcastTransport(format!(
                "eth_sendRawTransaction timed out after {:?}",
                self.request_timeout
            ))),
        }
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> GatewayResult<Option<TransactionReceipt>> {
        self.request(
            "eth_getTransactionReceipt",
            self.provider.get_transaction_receipt(tx_hash),
        )
        .await
    }

    async fn call(&self, tx: TypedTransaction) -> GatewayResult<Bytes> {
        self.request("eth_call", self.provider.call(&tx, None)).await
    }
}

/// The node answered, so the call itself cannot be executed as built
fn estimate_failure(e: ProviderError) -> GatewayError {
    match RpcError::as_error_response(&e) {
        Some(_) => GatewayError::InvalidGasParameters(format!("gas estimation rejected: {}", e)),
        None => GatewayError::NetworkUnavailable(format!("eth_estimateGas failed: {}", e)),
    }
}

/// A JSON-RPC error means the node refused the transaction; anything else
/// leaves its fate unknown
fn broadcast_failure(e: ProviderError) -> GatewayError {
    match RpcError::as_error_response(&e) {
        Some(rpc_error) => GatewayError::BroadcastRejected(rpc_error.message.clone()),
        None => GatewayError::BroadcastTransport(e.to_string()),
    }
}
