//! Gas policy resolution for campaign transactions

use crate::chain::NetworkClient;
use crate::config::{FeePolicy, GasConfig, GasLimitPolicy};
use crate::contract::ContractCallPayload;
use crate::error::{GatewayError, GatewayResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Eip1559TransactionRequest, U256};
use std::sync::Arc;
use tracing::debug;

const GWEI: u64 = 1_000_000_000;

/// Gas fields attached to an EIP-1559 transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParameters {
    pub gas_limit: u64,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl GasParameters {
    /// Worst-case cost in wei
    pub fn max_cost(&self) -> U256 {
        U256::from(self.gas_limit).saturating_mul(self.max_fee_per_gas)
    }
}

/// Resolves the configured gas policy into concrete values
pub struct GasEstimator {
    network: Arc<dyn NetworkClient>,
    config: GasConfig,
}

impl GasEstimator {
    pub fn new(network: Arc<dyn NetworkClient>, config: GasConfig) -> Self {
        Self { network, config }
    }

    /// Gas parameters for sending `payload` from `from`
    pub async fn gas_parameters(
        &self,
        from: Address,
        payload: &ContractCallPayload,
    ) -> GatewayResult<GasParameters> {
        let gas_limit = self.gas_limit(from, payload).await?;
        let (max_fee_per_gas, max_priority_fee_per_gas) = self.fees().await?;

        let params = GasParameters {
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
        };
        debug!("Gas parameters: {:?} (max cost {} wei)", params, params.max_cost());
        Ok(params)
    }

    async fn gas_limit(&self, from: Address, payload: &ContractCallPayload) -> GatewayResult<u64> {
        let limit = match self.config.limit {
            GasLimitPolicy::Fixed { value } => U256::from(value),
            GasLimitPolicy::Estimate { buffer_percent } => {
                let draft = TypedTransaction::Eip1559(
                    Eip1559TransactionRequest::new()
                        .from(from)
                        .to(payload.to())
                        .data(payload.data().clone()),
                );
                let estimate = self.network.estimate_gas(draft).await?;
                estimate
                    .checked_mul(U256::from(buffer_percent))
                    .map(|scaled| scaled / 100)
                    .and_then(|buffer| estimate.checked_add(buffer))
                    .ok_or_else(|| {
                        GatewayError::InvalidGasParameters(format!(
                            "gas estimate {} is out of range",
                            estimate
                        ))
                    })?
            }
        };

        if limit > U256::from(self.config.max_gas_limit) {
            return Err(GatewayError::InvalidGasParameters(format!(
                "gas limit {} exceeds the maximum of {}",
                limit, self.config.max_gas_limit
            )));
        }

        Ok(limit.as_u64())
    }

    async fn fees(&self) -> GatewayResult<(U256, U256)> {
        match self.config.fees {
            FeePolicy::Fixed {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => Ok((
                U256::from(max_fee_per_gas),
                U256::from(max_priority_fee_per_gas),
            )),
            FeePolicy::Network {
                priority_fee_gwei,
                max_fee_cap_gwei,
            } => {
                let base_fee = self.network.base_fee_per_gas().await?;
                let priority_fee = U256::from(priority_fee_gwei) * U256::from(GWEI);

                // Max fee = 2 * base_fee + priority_fee (buffer for block variability)
                let max_fee = base_fee
                    .checked_mul(U256::from(2))
                    .and_then(|doubled| doubled.checked_add(priority_fee))
                    .ok_or_else(|| {
                        GatewayError::InvalidGasParameters(format!(
                            "base fee {} is out of range",
                            base_fee
                        ))
                    })?;

                let cap = U256::from(max_fee_cap_gwei) * U256::from(GWEI);
                Ok((std::cmp::min(max_fee, cap), priority_fee))
            }
        }
    }
}
