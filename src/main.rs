//! Crowdfund Gateway - campaign submission service
//!
//! Serves the JSON API that lists deployed campaigns and turns campaign forms
//! into signed `requestProjectCreation` transactions.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use crowdfund_gateway::api::{self, AppState};
use crowdfund_gateway::chain::{NetworkClient, RpcNetworkClient};
use crowdfund_gateway::config::Settings;
use crowdfund_gateway::contract::{CampaignReader, ContractInterface};
use crowdfund_gateway::metrics::MetricsServer;
use crowdfund_gateway::pipeline::CampaignPipeline;
use crowdfund_gateway::tx::TxSigner;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Crowdfund Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!("Loaded configuration for RPC {}", settings.network.rpc_url);

    let network: Arc<dyn NetworkClient> = Arc::new(RpcNetworkClient::new(
        &settings.network.rpc_url,
        settings.request_timeout(),
    )?);

    let chain_id = match settings.network.chain_id {
        Some(chain_id) => chain_id,
        None => network
            .chain_id()
            .await
            .context("Failed to query chain ID")?,
    };
    info!("Using chain {}", chain_id);

    // Contract interface
    let contract_address = settings.contract_address()?;
    let contract = match &settings.contract.abi_path {
        Some(path) => ContractInterface::from_file(contract_address, path)?,
        None => ContractInterface::builtin(contract_address),
    };

    // Signing key stays inside the signer from here on
    let signer = TxSigner::from_env(&settings.wallet.private_key_env)?;

    let pipeline = Arc::new(CampaignPipeline::new(
        chain_id,
        network.clone(),
        contract.clone(),
        signer,
        settings.gas.clone(),
        &settings.broadcast,
    ));
    let reader = Arc::new(CampaignReader::new(network, contract));

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(&settings.metrics);
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!(
        "API server: http://{}:{}",
        settings.api.host, settings.api.port
    );

    api::run_server(
        settings.api.clone(),
        AppState { pipeline, reader },
        shutdown_signal(),
    )
    .await?;

    info!("Shutdown signal received, stopping...");

    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Crowdfund Gateway stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,crowdfund_gateway=debug,hyper=warn,tower_http=info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
