//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Chain backend health
//! - Balance query volume and outcomes
//! - Transaction submission lifecycle counts

use crate::error::GatewayResult;

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Encoder, Gauge, GaugeVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Chain metrics
    pub static ref CHAIN_CONNECTED: GaugeVec = register_gauge_vec!(
        "blockport_chain_connected",
        "Chain backend health (1=healthy, 0=unhealthy)",
        &["chain"]
    ).unwrap();

    // Balance metrics
    pub static ref BALANCE_QUERIES: CounterVec = register_counter_vec!(
        "blockport_balance_queries_total",
        "Total balance queries by outcome",
        &["chain", "outcome"]
    ).unwrap();

    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "blockport_transactions_submitted_total",
        "Total transactions accepted by a chain backend",
        &["chain"]
    ).unwrap();

    pub static ref TX_CONFIRMED: CounterVec = register_counter_vec!(
        "blockport_transactions_confirmed_total",
        "Total transactions confirmed",
        &["chain"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "blockport_transactions_failed_total",
        "Total transactions failed",
        &["chain"]
    ).unwrap();

    pub static ref TX_IN_FLIGHT: Gauge = register_gauge!(
        "blockport_transactions_in_flight",
        "Submitted transactions awaiting finality"
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: Counter = register_counter!(
        "blockport_health_check_success_total",
        "Total successful health checks"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> GatewayResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::error::GatewayError::Config(e.to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::GatewayError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_chain_health(chain: &str, healthy: bool) {
    CHAIN_CONNECTED
        .with_label_values(&[chain])
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_balance_query(chain: &str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    BALANCE_QUERIES.with_label_values(&[chain, outcome]).inc();
}

pub fn record_tx_submitted(chain: &str) {
    TX_SUBMITTED.with_label_values(&[chain]).inc();
}

pub fn record_tx_confirmed(chain: &str) {
    TX_CONFIRMED.with_label_values(&[chain]).inc();
}

pub fn record_tx_failed(chain: &str) {
    TX_FAILED.with_label_values(&[chain]).inc();
}

pub fn record_in_flight(count: u64) {
    TX_IN_FLIGHT.set(count as f64);
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.inc();
}
