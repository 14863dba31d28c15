//! Campaign creation pipeline
//!
//! One run per request:
//! `Received → Converted → Encoded → NonceResolved → Assembled → Signed →
//! Broadcast → {Confirmed | Failed}`. Every stage fails fast and nothing is
//! retried automatically.

mod reconcile;

pub use reconcile::{reconcile, PipelineFailure, PipelineResult};

use crate::chain::NetworkClient;
use crate::config::{BroadcastConfig, GasConfig};
use crate::contract::{ContractInterface, CREATE_PROJECT_METHOD};
use crate::error::{GatewayError, GatewayResult};
use crate::tx::{
    assemble, to_base_units, AccountLocks, Confirmation, GasEstimator, NonceResolver,
    TransactionSender, TxSigner,
};

use ethers::abi::Token;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// A request to create a crowdfunding campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRequest {
    /// Account that asked for the campaign
    #[serde(rename = "address")]
    pub creator: Address,
    pub title: String,
    pub description: String,
    /// Decimal amount in the native currency, e.g. `"10"`
    pub funding_target: String,
    pub minimum_contribution: String,
}

/// Parse a 20-byte hex account identifier
pub fn parse_address(input: &str) -> GatewayResult<Address> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|_| GatewayError::Format(format!("`{}` is not a valid account address", input)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Converted,
    Encoded,
    NonceResolved,
    Assembled,
    Signed,
    Broadcast,
    Confirmed,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Converted => "converted",
            PipelineStage::Encoded => "encoded",
            PipelineStage::NonceResolved => "nonce_resolved",
            PipelineStage::Assembled => "assembled",
            PipelineStage::Signed => "signed",
            PipelineStage::Broadcast => "broadcast",
            PipelineStage::Confirmed => "confirmed",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Confirmed(Confirmation),
    Failed {
        /// Last state reached
        stage: PipelineStage,
        error: GatewayError,
    },
}

/// Builds, signs and broadcasts `requestProjectCreation` calls
pub struct CampaignPipeline {
    chain_id: u64,
    contract: ContractInterface,
    signer: Arc<TxSigner>,
    nonces: NonceResolver,
    gas: GasEstimator,
    sender: TransactionSender,
    /// Present when nonce use is serialized per account
    account_locks: Option<AccountLocks>,
}

impl CampaignPipeline {
    pub fn new(
        chain_id: u64,
        network: Arc<dyn NetworkClient>,
        contract: ContractInterface,
        signer: TxSigner,
        gas: GasConfig,
        broadcast: &BroadcastConfig,
    ) -> Self {
        let account_locks = broadcast.serialize_per_account.then(AccountLocks::new);

        info!(
            "Campaign pipeline on chain {} for contract {:?}, signing as {:?}",
            chain_id,
            contract.address(),
            signer.address()
        );

        Self {
            chain_id,
            contract,
            signer: Arc::new(signer),
            nonces: NonceResolver::new(network.clone()),
            gas: GasEstimator::new(network.clone(), gas),
            sender: TransactionSender::new(network, broadcast),
            account_locks,
        }
    }

    /// Run the pipeline for `request` and reconcile the result
    pub async fn submit(&self, request: CampaignRequest) -> PipelineResult {
        let request_id = Uuid::new_v4();
        let span = info_span!("campaign", %request_id);

        async move {
            let started = Instant::now();
            let result = reconcile(self.execute(&request).await);
            crate::metrics::record_pipeline_result(&result, started.elapsed().as_secs_f64());
            result
        }
        .instrument(span)
        .await
    }

    /// Run the pipeline without reconciling
    pub async fn execute(&self, request: &CampaignRequest) -> TransactionOutcome {
        let mut stage = PipelineStage::Received;

        match self.run(request, &mut stage).await {
            Ok(confirmation) => {
                debug!("Stage {} -> {}", stage, PipelineStage::Confirmed);
                TransactionOutcome::Confirmed(confirmation)
            }
            Err(error) => {
                debug!("Stage {} -> {}", stage, PipelineStage::Failed);
                TransactionOutcome::Failed { stage, error }
            }
        }
    }

    async fn run(
        &self,
        request: &CampaignRequest,
        stage: &mut PipelineStage,
    ) -> GatewayResult<Confirmation> {
        info!(
            "Creating campaign {:?} requested by {:?}",
            request.title, request.creator
        );

        let funding_target = to_base_units(&request.funding_target)?;
        let minimum_contribution = to_base_units(&request.minimum_contribution)?;
        debug!(
            "Funding target {} wei, minimum contribution {} wei",
            funding_target, minimum_contribution
        );
        advance(stage, PipelineStage::Converted);

        let payload = self.contract.encode_call(
            CREATE_PROJECT_METHOD,
            &[
                Token::Uint(funding_target),
                Token::Uint(minimum_contribution),
                Token::String(request.title.clone()),
                Token::String(request.description.clone()),
            ],
        )?;
        advance(stage, PipelineStage::Encoded);

        // The network derives the sender from the signature
        let from = self.signer.address();
        if request.creator != from {
            debug!("Submitting on behalf of {:?} from {:?}", request.creator, from);
        }

        let guard = match &self.account_locks {
            Some(locks) => Some(locks.acquire(from).await),
            None => None,
        };

        let nonce = self.nonces.resolve_nonce(from).await?;
        advance(stage, PipelineStage::NonceResolved);

        let gas = self.gas.gas_parameters(from, &payload).await?;
        let tx = assemble(self.chain_id, from, &payload, nonce, gas)?;
        advance(stage, PipelineStage::Assembled);

        let signed = self.signer.sign(tx)?;
        advance(stage, PipelineStage::Signed);

        let tx_hash = self.sender.submit(&signed).await?;
        // The node now counts this nonce as pending
        drop(guard);
        advance(stage, PipelineStage::Broadcast);

        self.sender.await_confirmation(tx_hash).await
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    debug!("Stage {} -> {}", stage, next);
    *stage = next;
}
