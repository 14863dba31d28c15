//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Campaign submissions by outcome
//! - Failures by kind
//! - End-to-end pipeline latency
//! - Last resolved nonce

use crate::config::MetricsConfig;
use crate::pipeline::PipelineResult;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref CAMPAIGN_SUBMISSIONS: CounterVec = register_counter_vec!(
        "crowdfund_campaign_submissions_total",
        "Campaign submissions by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref CAMPAIGN_FAILURES: CounterVec = register_counter_vec!(
        "crowdfund_campaign_failures_total",
        "Failed campaign submissions by failure kind",
        &["kind", "indeterminate"]
    ).unwrap();

    pub static ref PIPELINE_LATENCY: HistogramVec = register_histogram_vec!(
        "crowdfund_pipeline_latency_seconds",
        "Time from request to confirmation or failure",
        &["outcome"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    pub static ref LAST_NONCE: Gauge = register_gauge!(
        "crowdfund_last_resolved_nonce",
        "Most recently resolved pending nonce of the signing account"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(config: &MetricsConfig) -> Self {
        Self { port: config.port }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_pipeline_result(result: &PipelineResult, latency_secs: f64) {
    let outcome = match result {
        PipelineResult::Confirmed { .. } => "confirmed",
        PipelineResult::Failed(failure) => {
            CAMPAIGN_FAILURES
                .with_label_values(&[
                    failure.kind.as_str(),
                    if failure.indeterminate { "true" } else { "false" },
                ])
                .inc();
            "failed"
        }
    };

    CAMPAIGN_SUBMISSIONS.with_label_values(&[outcome]).inc();
    PIPELINE_LATENCY
        .with_label_values(&[outcome])
        .observe(latency_secs);
}

pub fn record_nonce_resolved(nonce: u64) {
    LAST_NONCE.set(nonce as f64);
}
