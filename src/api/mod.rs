//! HTTP API: login, campaign listing and campaign submission
//!
//! A thin JSON layer. Requests are forwarded to the pipeline and its result is
//! relayed; a failure is never answered with a redirect.

use crate::config::ApiConfig;
use crate::contract::CampaignReader;
use crate::error::{FailureKind, GatewayError, GatewayResult};
use crate::pipeline::{
    parse_address, reconcile, CampaignPipeline, CampaignRequest, PipelineResult, PipelineStage,
    TransactionOutcome,
};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

const DASHBOARD_PATH: &str = "/dashboard";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CampaignPipeline>,
    pub reader: Arc<CampaignReader>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run_server<F>(config: ApiConfig, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn login(body: Result<Json<LoginRequest>, JsonRejection>) -> Response {
    let address = match read_body(body).and_then(|Json(body)| parse_address(&body.address)) {
        Ok(address) => address,
        Err(e) => return rejected(e),
    };

    info!("Logged in with: {:?}", address);
    Json(json!({ "redirectTo": DASHBOARD_PATH })).into_response()
}

/// Deployed campaigns; lookup failures are logged and yield an empty list
async fn list_campaigns(State(state): State<AppState>) -> impl IntoResponse {
    let projects = match state.reader.list_projects().await {
        Ok(projects) => {
            info!("All deployed projects: {}", projects.len());
            projects
        }
        Err(e) => {
            error!("Error fetching projects: {}", e);
            Vec::new()
        }
    };

    Json(json!({ "projects": projects }))
}

async fn create_campaign(
    State(state): State<AppState>,
    form: Result<Json<CampaignForm>, JsonRejection>,
) -> Response {
    let request = match read_body(form).and_then(|Json(form)| form.into_request()) {
        Ok(request) => request,
        Err(e) => return rejected(e),
    };

    info!("Creating campaign using: {:?}", request.creator);

    match state.pipeline.submit(request).await {
        PipelineResult::Confirmed {
            tx_hash,
            block_number,
        } => Json(json!({
            "status": "confirmed",
            "tx_hash": tx_hash,
            "block_number": block_number,
            "redirectTo": DASHBOARD_PATH,
        }))
        .into_response(),
        failed => failure_response(failed),
    }
}

/// Malformed bodies get the same failure shape as pipeline errors
fn read_body<T>(body: Result<Json<T>, JsonRejection>) -> GatewayResult<Json<T>> {
    body.map_err(|rejection| {
        debug!("Rejected request body: {}", rejection.body_text());
        GatewayError::Format("request body is not valid JSON with the expected fields".to_string())
    })
}

fn rejected(error: GatewayError) -> Response {
    failure_response(reconcile(TransactionOutcome::Failed {
        stage: PipelineStage::Received,
        error,
    }))
}

fn failure_response(result: PipelineResult) -> Response {
    let status = match result.failure().map(|f| f.kind) {
        Some(FailureKind::Format) | Some(FailureKind::Precision) => StatusCode::BAD_REQUEST,
        Some(FailureKind::InvalidGasParameters) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(FailureKind::NetworkUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
        Some(FailureKind::Broadcast) => StatusCode::BAD_GATEWAY,
        Some(FailureKind::SignatureMismatch) | Some(FailureKind::Configuration) | None => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, Json(result)).into_response()
}

// Request and response types

#[derive(Deserialize)]
struct LoginRequest {
    address: String,
}

#[derive(Deserialize)]
struct CampaignForm {
    address: String,
    title: String,
    description: String,
    funding_target: AmountField,
    minimum_contribution: AmountField,
}

impl CampaignForm {
    fn into_request(self) -> GatewayResult<CampaignRequest> {
        Ok(CampaignRequest {
            creator: parse_address(&self.address)?,
            title: self.title,
            description: self.description,
            funding_target: self.funding_target.into_literal()?,
            minimum_contribution: self.minimum_contribution.into_literal()?,
        })
    }
}

/// Form amounts arrive as decimal strings or as bare JSON integers
///
/// Fractional JSON numbers are refused: serde_json has already read them as
/// floats.
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountField {
    Text(String),
    Number(serde_json::Number),
}

impl AmountField {
    fn into_literal(self) -> GatewayResult<String> {
        match self {
            AmountField::Text(text) => Ok(text),
            AmountField::Number(number) => match number.as_u64() {
                Some(whole) => Ok(whole.to_string()),
                None => Err(GatewayError::Format(
                    "fractional amounts must be sent as decimal strings".to_string(),
                )),
            },
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockNetworkClient, NetworkClient};
    use crate::config::{BroadcastConfig, FeePolicy, GasConfig, GasLimitPolicy};
    use crate::contract::ContractInterface;
    use crate::tx::TxSigner;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ethers::types::{Address, TransactionReceipt, H256, U64};
    use serde_json::Value;
    use tower::ServiceExt;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn app(network: MockNetworkClient) -> Router {
        let network: Arc<dyn NetworkClient> = Arc::new(network);
        let contract = ContractInterface::builtin(Address::repeat_byte(0xcc));

        let pipeline = CampaignPipeline::new(
            31337,
            network.clone(),
            contract.clone(),
            TxSigner::from_hex(DEV_KEY).unwrap(),
            GasConfig {
                max_gas_limit: 30_000_000,
                limit: GasLimitPolicy::Fixed { value: 500_000 },
                fees: FeePolicy::Fixed {
                    max_fee_per_gas: 70_000_000_000,
                    max_priority_fee_per_gas: 1_000_000_000,
                },
            },
            &BroadcastConfig {
                receipt_timeout_secs: 1,
                poll_interval_ms: 10,
                serialize_per_account: true,
            },
        );

        router(AppState {
            pipeline: Arc::new(pipeline),
            reader: Arc::new(CampaignReader::new(network, contract)),
        })
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn campaign_body() -> Value {
        json!({
            "address": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "title": "Water Well",
            "description": "Clean water for the village",
            "funding_target": 10,
            "minimum_contribution": "0.1"
        })
    }

    #[tokio::test]
    async fn test_login_redirects_to_dashboard() {
        let (status, body) = post_json(
            app(MockNetworkClient::new()),
            "/login",
            json!({ "address": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["redirectTo"], "/dashboard");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_address() {
        let (status, body) = post_json(
            app(MockNetworkClient::new()),
            "/login",
            json!({ "address": "nobody" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("redirectTo").is_none());
    }

    #[tokio::test]
    async fn test_create_campaign_confirmed() {
        let mut network = MockNetworkClient::new();
        network.expect_get_transaction_count().returning(|_, _| Ok(0));
        network
            .expect_send_raw_transaction()
            .returning(|raw| Ok(H256::from(ethers::utils::keccak256(&raw))));
        network.expect_get_transaction_receipt().returning(|_| {
            Ok(Some(TransactionReceipt {
                block_number: Some(U64::from(3)),
                status: Some(U64::from(1)),
                ..Default::default()
            }))
        });

        let (status, body) = post_json(app(network), "/campaigns", campaign_body()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "confirmed");
        assert_eq!(body["block_number"], 3);
        assert_eq!(body["redirectTo"], "/dashboard");
    }

    #[tokio::test]
    async fn test_create_campaign_broadcast_failure_is_not_redirected() {
        let mut network = MockNetworkClient::new();
        network.expect_get_transaction_count().returning(|_, _| Ok(0));
        network
            .expect_send_raw_transaction()
            .returning(|_| Err(GatewayError::BroadcastTransport("connection reset".to_string())));

        let (status, body) = post_json(app(network), "/campaigns", campaign_body()).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["kind"], "network_unavailable");
        assert_eq!(body["indeterminate"], true);
        assert!(body.get("redirectTo").is_none());
    }

    #[tokio::test]
    async fn test_create_campaign_precision_error() {
        let mut body = campaign_body();
        body["funding_target"] = json!("1.2345678901234567891");

        let (status, body) = post_json(app(MockNetworkClient::new()), "/campaigns", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "precision");
    }

    #[tokio::test]
    async fn test_fractional_json_number_is_refused_not_rounded() {
        // No expectations: the request must stop before the network
        let mut body = campaign_body();
        body["funding_target"] = serde_json::from_str("1.23456789012345678").unwrap();

        let (status, body) = post_json(app(MockNetworkClient::new()), "/campaigns", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["kind"], "format");
        assert_eq!(body["stage"], "received");
    }

    #[tokio::test]
    async fn test_decimal_string_amount_is_sent_exactly() {
        let mut network = MockNetworkClient::new();
        network.expect_get_transaction_count().returning(|_, _| Ok(0));
        network.expect_send_raw_transaction().returning(|raw| {
            let exact = ethers::abi::encode(&[ethers::abi::Token::Uint(
                ethers::types::U256::from_dec_str("1234567890123456780").unwrap(),
            )]);
            assert!(raw.windows(32).any(|word| word == exact.as_slice()));
            Ok(H256::from(ethers::utils::keccak256(&raw)))
        });
        network.expect_get_transaction_receipt().returning(|_| {
            Ok(Some(TransactionReceipt {
                block_number: Some(U64::from(3)),
                status: Some(U64::from(1)),
                ..Default::default()
            }))
        });

        let mut body = campaign_body();
        body["funding_target"] = json!("1.23456789012345678");

        let (status, body) = post_json(app(network), "/campaigns", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "confirmed");
    }

    #[tokio::test]
    async fn test_missing_field_gets_failure_shape() {
        let mut body = campaign_body();
        body.as_object_mut().unwrap().remove("minimum_contribution");

        let (status, body) = post_json(app(MockNetworkClient::new()), "/campaigns", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["kind"], "format");
        assert_eq!(body["indeterminate"], false);
        assert_eq!(body["stage"], "received");
        assert!(!body["message"].as_str().unwrap().contains("deserialize"));
    }

    #[tokio::test]
    async fn test_login_without_address_gets_failure_shape() {
        let (status, body) = post_json(app(MockNetworkClient::new()), "/login", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "format");
        assert!(body.get("redirectTo").is_none());
    }

    #[tokio::test]
    async fn test_list_campaigns_logs_and_returns_empty_on_failure() {
        let mut network = MockNetworkClient::new();
        network
            .expect_call()
            .returning(|_| Err(GatewayError::NetworkUnavailable("down".to_string())));

        let response = app(network)
            .oneshot(Request::get("/campaigns").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["projects"], json!([]));
    }
}
