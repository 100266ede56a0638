//! BlockPort Gateway - Multi-chain balance and transaction dispatch
//!
//! The gateway resolves per-chain adapters for balance queries and
//! transaction submission, tracks every transaction through a monotonic
//! lifecycle, and polls chain backends until finality.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod api;
mod asset;
mod chain;
mod config;
mod engine;
mod error;
mod metrics;
mod tracker;

use api::AppState;
use chain::AdapterRegistry;
use config::Settings;
use engine::DispatchEngine;
use metrics::MetricsServer;
use tracker::{StatusPoller, TransactionTracker};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting BlockPort Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {} chains",
        settings.enabled_chains().len()
    );

    // Build the adapter registry (one adapter per enabled chain)
    let registry = Arc::new(AdapterRegistry::from_settings(&settings)?);
    info!("Chain adapters initialized: {:?}", registry.registered_chains());

    // Transaction record store
    let tracker = Arc::new(TransactionTracker::new());

    // Dispatch engine
    let engine = Arc::new(DispatchEngine::new(
        registry.clone(),
        tracker.clone(),
        settings.gateway.clone(),
    ));

    // Status poller for submitted transactions
    let poller = Arc::new(StatusPoller::new(
        tracker.clone(),
        registry.clone(),
        settings.gateway.clone(),
    ));

    // Initialize metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let state = AppState {
            engine: engine.clone(),
            tracker: tracker.clone(),
            registry: registry.clone(),
        };
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    // Start status poller
    let poller_handle = tokio::spawn({
        let poller = poller.clone();
        async move {
            if let Err(e) = poller.run().await {
                error!("Status poller error: {}", e);
            }
        }
    });

    // Health check loop
    let health_handle = tokio::spawn({
        let registry = registry.clone();
        let tracker = tracker.clone();
        let interval = settings.gateway.health_check_interval_secs;
        async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;

                let health = registry.health_check().await;
                for (chain, healthy) in health {
                    if !healthy {
                        warn!("Chain {} health check failed", chain);
                    }
                }

                metrics::record_in_flight(tracker.stats().submitted);
                metrics::record_health_check();
            }
        }
    });

    info!("BlockPort Gateway is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Graceful shutdown: submitted records stay submitted for resumption
    poller.stop().await;

    // Abort background tasks
    api_handle.abort();
    poller_handle.abort();
    health_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("BlockPort Gateway stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,blockport_gateway=debug,hyper=warn"));

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
