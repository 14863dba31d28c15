//! Signing and broadcasting of assembled transactions
//!
//! A transaction is submitted exactly once. Failures are classified rather than
//! retried: the caller decides what to do with an indeterminate outcome.

use super::signer::SignedTransaction;
use crate::chain::NetworkClient;
use crate::config::BroadcastConfig;
use crate::error::{GatewayError, GatewayResult};

use ethers::types::{TransactionReceipt, H256, U256, U64};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Block inclusion record of a successful transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub tx_hash: H256,
    pub block_number: u64,
    pub block_hash: Option<H256>,
    pub gas_used: Option<U256>,
}

/// Submits signed transactions and waits for their receipts
pub struct TransactionSender {
    network: Arc<dyn NetworkClient>,
    /// How long to wait for inclusion after submission
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl TransactionSender {
    pub fn new(network: Arc<dyn NetworkClient>, config: &BroadcastConfig) -> Self {
        Self {
            network,
            receipt_timeout: config.receipt_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Submit and wait for the receipt
    pub async fn broadcast(&self, signed: &SignedTransaction) -> GatewayResult<Confirmation> {
        let tx_hash = self.submit(signed).await?;
        self.await_confirmation(tx_hash).await
    }

    /// Hand the raw transaction to the network
    ///
    /// Once this returns `Ok` the nonce is taken in the node's mempool.
    pub async fn submit(&self, signed: &SignedTransaction) -> GatewayResult<H256> {
        let tx_hash = self
            .network
            .send_raw_transaction(signed.raw().clone())
            .await?;

        if tx_hash != signed.hash() {
            warn!(
                "Node reported hash {:?}, locally computed {:?}",
                tx_hash,
                signed.hash()
            );
        }

        info!(
            "Transaction sent: {:?} (nonce {})",
            tx_hash,
            signed.transaction().nonce
        );
        Ok(tx_hash)
    }

    /// Poll for the receipt of `tx_hash` until the receipt timeout expires
    pub async fn await_confirmation(&self, tx_hash: H256) -> GatewayResult<Confirmation> {
        let poll = async {
            loop {
                match self.network.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) if receipt.block_number.is_some() => return receipt,
                    Ok(_) => debug!("Transaction {:?} not yet included", tx_hash),
                    // A failed lookup says nothing about the transaction itself
                    Err(e) => warn!("Receipt lookup for {:?} failed: {}", tx_hash, e),
                }
                sleep(self.poll_interval).await;
            }
        };

        match timeout(self.receipt_timeout, poll).await {
            Ok(receipt) => confirmation_from_receipt(tx_hash, receipt),
            Err(_) => {
                warn!(
                    "Transaction {:?} not confirmed within {:?}",
                    tx_hash, self.receipt_timeout
                );
                Err(GatewayError::BroadcastTimeout {
                    tx_hash,
                    waited_secs: self.receipt_timeout.as_secs(),
                })
            }
        }
    }
}

fn confirmation_from_receipt(
    tx_hash: H256,
    receipt: TransactionReceipt,
) -> GatewayResult<Confirmation> {
    let block_number = receipt.block_number.map(|b| b.as_u64()).unwrap_or_default();

    if receipt.status == Some(U64::zero()) {
        warn!("Transaction {:?} reverted in block {}", tx_hash, block_number);
        return Err(GatewayError::BroadcastReverted {
            tx_hash,
            block_number,
        });
    }

    info!("Transaction {:?} confirmed in block {}", tx_hash, block_number);
    Ok(Confirmation {
        tx_hash,
        block_number,
        block_hash: receipt.block_hash,
        gas_used: receipt.gas_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNetworkClient;
    use crate::tx::{TxSigner, UnsignedTransaction};
    use ethers::types::{Address, Bytes};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn config() -> BroadcastConfig {
        BroadcastConfig {
            receipt_timeout_secs: 1,
            poll_interval_ms: 10,
            serialize_per_account: true,
        }
    }

    fn signed() -> SignedTransaction {
        let signer = TxSigner::from_hex(DEV_KEY).unwrap();
        signer
            .sign(UnsignedTransaction {
                chain_id: 31337,
                from: signer.address(),
                to: Address::repeat_byte(0xcc),
                data: Bytes::from(vec![1, 2, 3, 4]),
                gas_limit: 100_000,
                max_fee_per_gas: U256::from(2_000_000_000u64),
                max_priority_fee_per_gas: U256::from(1_000_000_000u64),
                nonce: 0,
            })
            .unwrap()
    }

    fn receipt(status: u64) -> TransactionReceipt {
        TransactionReceipt {
            block_number: Some(U64::from(42)),
            block_hash: Some(H256::repeat_byte(0xbb)),
            status: Some(U64::from(status)),
            gas_used: Some(U256::from(80_000)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_confirmed_after_polling() {
        let signed = signed();
        let hash = signed.hash();
        let polls = Arc::new(AtomicUsize::new(0));

        let mut network = MockNetworkClient::new();
        network
            .expect_send_raw_transaction()
            .times(1)
            .returning(move |_| Ok(hash));
        let counter = polls.clone();
        network
            .expect_get_transaction_receipt()
            .returning(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Ok(None)
                } else {
                    Ok(Some(receipt(1)))
                }
            });

        let sender = TransactionSender::new(Arc::new(network), &config());
        let confirmation = sender.broadcast(&signed).await.unwrap();

        assert_eq!(confirmation.tx_hash, hash);
        assert_eq!(confirmation.block_number, 42);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let mut network = MockNetworkClient::new();
        network
            .expect_send_raw_transaction()
            .times(1)
            .returning(|_| Err(GatewayError::BroadcastTransport("connection reset".to_string())));

        let sender = TransactionSender::new(Arc::new(network), &config());
        let err = sender.broadcast(&signed()).await.unwrap_err();
        assert!(err.is_indeterminate());
    }

    #[tokio::test]
    async fn test_rejection_surfaces_unchanged() {
        let mut network = MockNetworkClient::new();
        network
            .expect_send_raw_transaction()
            .returning(|_| Err(GatewayError::BroadcastRejected("nonce too low".to_string())));

        let sender = TransactionSender::new(Arc::new(network), &config());
        let err = sender.broadcast(&signed()).await.unwrap_err();
        assert_eq!(err, GatewayError::BroadcastRejected("nonce too low".to_string()));
    }

    #[tokio::test]
    async fn test_reverted_receipt() {
        let signed = signed();
        let hash = signed.hash();

        let mut network = MockNetworkClient::new();
        network
            .expect_send_raw_transaction()
            .returning(move |_| Ok(hash));
        network
            .expect_get_transaction_receipt()
            .returning(|_| Ok(Some(receipt(0))));

        let sender = TransactionSender::new(Arc::new(network), &config());
        let err = sender.broadcast(&signed).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::BroadcastReverted {
                tx_hash: hash,
                block_number: 42
            }
        );
        assert!(!err.is_indeterminate());
    }

    #[tokio::test]
    async fn test_missing_receipt_times_out() {
        let signed = signed();
        let hash = signed.hash();

        let mut network = MockNetworkClient::new();
        network
            .expect_send_raw_transaction()
            .returning(move |_| Ok(hash));
        network
            .expect_get_transaction_receipt()
            .returning(|_| Ok(None));

        let sender = TransactionSender::new(Arc::new(network), &config());
        let err = sender.broadcast(&signed).await.unwrap_err();
        assert!(matches!(err, GatewayError::BroadcastTimeout { tx_hash, .. } if tx_hash == hash));
        assert!(err.is_indeterminate());
    }
}
