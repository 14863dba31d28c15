//! Mapping of transaction outcomes to caller-visible results

use super::{PipelineStage, TransactionOutcome};
use crate::error::{FailureKind, GatewayError};

use ethers::types::H256;
use serde::Serialize;
use tracing::{info, warn};

/// What the boundary reports for one campaign submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineResult {
    Confirmed { tx_hash: H256, block_number: u64 },
    Failed(PipelineFailure),
}

/// Uniform failure shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineFailure {
    pub kind: FailureKind,
    pub message: String,
    /// The network may have accepted the transaction; re-check before retrying
    pub indeterminate: bool,
    /// Last state reached before the failure
    pub stage: PipelineStage,
    /// Set once the transaction has been handed to the network
    pub tx_hash: Option<H256>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Confirmed { .. })
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            PipelineResult::Failed(failure) => Some(failure),
            PipelineResult::Confirmed { .. } => None,
        }
    }
}

/// Normalize an outcome for the boundary
pub fn reconcile(outcome: TransactionOutcome) -> PipelineResult {
    match outcome {
        TransactionOutcome::Confirmed(confirmation) => {
            info!(
                "Campaign transaction {:?} confirmed in block {}",
                confirmation.tx_hash, confirmation.block_number
            );
            PipelineResult::Confirmed {
                tx_hash: confirmation.tx_hash,
                block_number: confirmation.block_number,
            }
        }
        TransactionOutcome::Failed { stage, error } => {
            warn!("Campaign submission failed after {}: {}", stage, error);
            PipelineResult::Failed(PipelineFailure {
                kind: error.kind(),
                message: caller_message(&error),
                indeterminate: error.is_indeterminate(),
                stage,
                tx_hash: submitted_hash(&error),
            })
        }
    }
}

/// Stable sentence for the caller; raw node errors stay in the logs
fn caller_message(error: &GatewayError) -> String {
    match error {
        GatewayError::Format(_) | GatewayError::Precision { .. } => error.to_string(),
        GatewayError::SignatureMismatch(_) => {
            "The request does not match the contract interface".to_string()
        }
        GatewayError::InvalidGasParameters(_) => {
            "The transaction's gas parameters are invalid; no transaction was sent".to_string()
        }
        GatewayError::NetworkUnavailable(_) => {
            "The blockchain network could not be reached; no transaction was sent".to_string()
        }
        GatewayError::BroadcastTransport(_) => {
            "The connection failed while broadcasting; the transaction may have been accepted, check the account before retrying".to_string()
        }
        GatewayError::BroadcastRejected(_) => {
            "The network rejected the transaction".to_string()
        }
        GatewayError::BroadcastReverted { block_number, .. } => format!(
            "The transaction was included in block {} but reverted",
            block_number
        ),
        GatewayError::BroadcastTimeout { waited_secs, .. } => format!(
            "The transaction was submitted but not confirmed within {}s; check its status before retrying",
            waited_secs
        ),
        GatewayError::Config(_) | GatewayError::Wallet(_) => {
            "The gateway is not configured to submit transactions".to_string()
        }
    }
}

fn submitted_hash(error: &GatewayError) -> Option<H256> {
    match error {
        GatewayError::BroadcastReverted { tx_hash, .. }
        | GatewayError::BroadcastTimeout { tx_hash, .. } => Some(*tx_hash),
        _ => None,
    }
}
