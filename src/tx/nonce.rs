//! Nonce resolution for transaction submission
//!
//! Handles:
//! - Fresh pending-aware nonce queries (no local caching)
//! - Optional per-account serialization of resolve → broadcast

use crate::chain::NetworkClient;
use crate::error::GatewayResult;

use dashmap::DashMap;
use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Resolves the next usable nonce for an account
pub struct NonceResolver {
    network: Arc<dyn NetworkClient>,
}

impl NonceResolver {
    pub fn new(network: Arc<dyn NetworkClient>) -> Self {
        Self { network }
    }

    /// Next nonce for `account`, counting transactions still in the mempool
    ///
    /// Every call queries the network. Two callers racing for the same account
    /// observe the same value unless they hold that account's [`AccountLocks`]
    /// guard across resolution and broadcast.
    pub async fn resolve_nonce(&self, account: Address) -> GatewayResult<u64> {
        let nonce = self.network.get_transaction_count(account, true).await?;
        debug!("Resolved pending nonce {} for {:?}", nonce, account);
        crate::metrics::record_nonce_resolved(nonce);
        Ok(nonce)
    }
}

/// Per-account async locks serializing nonce use within this process
#[derive(Default)]
pub struct AccountLocks {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `account`'s nonce sequence
    pub async fn acquire(&self, account: Address) -> OwnedMutexGuard<()> {
        // Clone out of the map so the shard lock is not held across the await
        let lock = self
            .locks
            .entry(account)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }
}
