//! Error types for the campaign gateway

use ethers::types::H256;
use serde::Serialize;
use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Invalid input: {0}")]
    Format(String),

    #[error("Amount has {digits} fractional digits, at most {max} are supported")]
    Precision { digits: usize, max: usize },

    #[error("Contract call does not match the interface: {0}")]
    SignatureMismatch(String),

    #[error("Invalid gas parameters: {0}")]
    InvalidGasParameters(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Transport failed while broadcasting: {0}")]
    BroadcastTransport(String),

    #[error("Transaction rejected by the network: {0}")]
    BroadcastRejected(String),

    #[error("Transaction {tx_hash:?} reverted in block {block_number}")]
    BroadcastReverted { tx_hash: H256, block_number: u64 },

    #[error("No receipt for transaction {tx_hash:?} after {waited_secs}s")]
    BroadcastTimeout { tx_hash: H256, waited_secs: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),
}

/// Caller-facing classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Format,
    Precision,
    SignatureMismatch,
    InvalidGasParameters,
    NetworkUnavailable,
    Broadcast,
    Configuration,
}

impl GatewayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GatewayError::Format(_) => FailureKind::Format,
            GatewayError::Precision { .. } => FailureKind::Precision,
            GatewayError::SignatureMismatch(_) => FailureKind::SignatureMismatch,
            GatewayError::InvalidGasParameters(_) => FailureKind::InvalidGasParameters,
            GatewayError::NetworkUnavailable(_) | GatewayError::BroadcastTransport(_) => {
                FailureKind::NetworkUnavailable
            }
            GatewayError::BroadcastRejected(_)
            | GatewayError::BroadcastReverted { .. }
            | GatewayError::BroadcastTimeout { .. } => FailureKind::Broadcast,
            GatewayError::Config(_) | GatewayError::Wallet(_) => FailureKind::Configuration,
        }
    }

    /// The network may or may not have accepted the transaction.
    ///
    /// Callers must re-check account state before submitting again, otherwise
    /// the same campaign can be created twice.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            GatewayError::BroadcastTransport(_) | GatewayError::BroadcastTimeout { .. }
        )
    }
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Format => "format",
            FailureKind::Precision => "precision",
            FailureKind::SignatureMismatch => "signature_mismatch",
            FailureKind::InvalidGasParameters => "invalid_gas_parameters",
            FailureKind::NetworkUnavailable => "network_unavailable",
            FailureKind::Broadcast => "broadcast",
            FailureKind::Configuration => "configuration",
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
