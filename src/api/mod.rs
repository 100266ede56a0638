//! HTTP API for the gateway
//!
//! Thin layer over the dispatch engine: JSON binding, route dispatch, and
//! error-to-status mapping only. Client errors surface as 400, unknown
//! record ids as 404, and backend failures as 502, always with an error
//! message; nothing here crashes the process.

use crate::chain::AdapterRegistry;
use crate::config::ApiConfig;
use crate::engine::DispatchEngine;
use crate::error::{GatewayError, GatewayResult};
use crate::tracker::{RecordStatus, TransactionRecord, TransactionTracker};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DispatchEngine>,
    pub tracker: Arc<TransactionTracker>,
    pub registry: Arc<AdapterRegistry>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/ready", get(readiness_check))
        .route("/api/v1/balance/:chain/:address", get(get_balance))
        .route("/api/v1/transaction", post(create_transaction))
        .route("/api/v1/transaction/:id", get(get_transaction))
        .route("/api/v1/chains", get(get_chains))
        .route("/api/v1/stats", get(get_stats))
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> GatewayResult<()> {
    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    Ok(())
}

/// Map a core error to an HTTP response
fn error_response(err: &GatewayError) -> Response {
    let status = match err {
        GatewayError::TransactionNotFound { .. } => StatusCode::NOT_FOUND,
        _ if err.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verify chain backends
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let chain_health = state.registry.health_check().await;
    let ready = chain_health.iter().all(|(_, healthy)| *healthy);

    let response = ReadinessResponse {
        ready,
        chains: chain_health
            .into_iter()
            .map(|(chain, healthy)| ChainHealth { chain, healthy })
            .collect(),
    };

    if ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Balance lookup for an address on a chain
async fn get_balance(
    State(state): State<AppState>,
    Path((chain, address)): Path<(String, String)>,
) -> Response {
    match state.engine.get_balance(&chain, &address).await {
        Ok(balance) => Json(BalanceResponse {
            chain,
            address,
            balance: balance.to_string(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Create and submit a transaction
async fn create_transaction(
    State(state): State<AppState>,
    Json(body): Json<CreateTransactionBody>,
) -> Response {
    let result = state
        .engine
        .create_transaction(&body.chain, &body.from, &body.to, &body.amount, &body.asset)
        .await;

    match result {
        Ok(record) => Json(TransactionResponse {
            id: record.id,
            tx_hash: record.hash,
            status: record.status.label().to_string(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Inspect a tracked transaction
async fn get_transaction(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match id.parse::<Uuid>() {
        Ok(id) => id,
        Err(_) => {
            return error_response(&GatewayError::TransactionNotFound { tx_id: id });
        }
    };

    match state.engine.get_transaction(id) {
        Ok(record) => Json(TransactionDetail::from(record)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// List registered chains
async fn get_chains(State(state): State<AppState>) -> impl IntoResponse {
    Json(ChainsResponse {
        chains: state.registry.registered_chains(),
    })
}

/// Per-status transaction record counts
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.tracker.stats();
    crate::metrics::record_in_flight(stats.submitted);

    Json(StatsResponse {
        pending: stats.pending,
        submitted: stats.submitted,
        confirmed: stats.confirmed,
        failed: stats.failed,
    })
}

// Request types

#[derive(Deserialize)]
struct CreateTransactionBody {
    chain: String,
    from: String,
    to: String,
    amount: String,
    asset: String,
}

// Response types

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    chains: Vec<ChainHealth>,
}

#[derive(Serialize)]
struct ChainHealth {
    chain: String,
    healthy: bool,
}

#[derive(Serialize)]
struct BalanceResponse {
    chain: String,
    address: String,
    balance: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionResponse {
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
    status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionDetail {
    id: Uuid,
    chain: String,
    from: String,
    to: String,
    amount: String,
    asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    history: Vec<HistoryEntry>,
}

#[derive(Serialize)]
struct HistoryEntry {
    status: String,
    at: DateTime<Utc>,
}

impl From<TransactionRecord> for TransactionDetail {
    fn from(record: TransactionRecord) -> Self {
        let failure = match record.status {
            RecordStatus::Failed(kind) => Some(kind.label().to_string()),
            _ => None,
        };

        Self {
            id: record.id,
            chain: record.chain,
            from: record.from,
            to: record.to,
            amount: record.amount.display(),
            asset: record.amount.spec.symbol.clone(),
            tx_hash: record.hash,
            status: record.status.label().to_string(),
            failure,
            created_at: record.created_at,
            updated_at: record.updated_at,
            history: record
                .history
                .into_iter()
                .map(|change| HistoryEntry {
                    status: change.status.label().to_string(),
                    at: change.at,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct ChainsResponse {
    chains: Vec<String>,
}

#[derive(Serialize)]
struct StatsResponse {
    pending: u64,
    submitted: u64,
    confirmed: u64,
    failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockAdapter;
    use crate::config::GatewayConfig;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with(adapter: MockAdapter) -> Router {
        let registry = Arc::new(AdapterRegistry::new());
        registry.register(Arc::new(adapter));
        let tracker = Arc::new(TransactionTracker::new());

        let engine = Arc::new(DispatchEngine::new(
            registry.clone(),
            tracker.clone(),
            GatewayConfig {
                poll_interval_ms: 500,
                adapter_timeout_ms: 100,
                submission_timeout_secs: 120,
                health_check_interval_secs: 30,
            },
        ));

        router(AppState {
            engine,
            tracker,
            registry,
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app_with(MockAdapter::default());

        let response = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response.into_response()).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_balance_success() {
        let app = app_with(MockAdapter::default());

        let response = app
            .oneshot(
                Request::get("/api/v1/balance/evm/0xA")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response.into_response()).await;
        assert_eq!(body["chain"], "evm");
        assert_eq!(body["address"], "0xA");
        assert_eq!(body["balance"], "1.5 ETH");
    }

    #[tokio::test]
    async fn test_balance_unknown_chain() {
        let app = app_with(MockAdapter::default());

        let response = app
            .oneshot(
                Request::get("/api/v1/balance/ripple/rA")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response.into_response()).await;
        assert_eq!(body["error"], "Unsupported chain: ripple");
    }

    #[tokio::test]
    async fn test_balance_backend_failure_maps_to_bad_gateway() {
        let app = app_with(MockAdapter {
            balance: None,
            ..Default::default()
        });

        let response = app
            .oneshot(
                Request::get("/api/v1/balance/evm/0xA")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response.into_response()).await;
        assert!(body["error"].as_str().unwrap().contains("Adapter error"));
    }

    #[tokio::test]
    async fn test_create_transaction_success() {
        let app = app_with(MockAdapter::default());

        let request = Request::post("/api/v1/transaction")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "chain": "evm",
                    "from": "0xA",
                    "to": "0xB",
                    "amount": "1.5",
                    "asset": "ETH",
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response.into_response()).await;
        assert_eq!(body["txHash"], "0xabc123");
        assert_eq!(body["status"], "submitted");
        assert!(body["id"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_create_transaction_malformed_amount() {
        let app = app_with(MockAdapter::default());

        let request = Request::post("/api/v1/transaction")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "chain": "evm",
                    "from": "0xA",
                    "to": "0xB",
                    "amount": "-1",
                    "asset": "ETH",
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response.into_response()).await;
        assert!(body["error"].as_str().unwrap().contains("Malformed amount"));
    }

    #[tokio::test]
    async fn test_transaction_detail_roundtrip() {
        let app = app_with(MockAdapter::default());

        let create = Request::post("/api/v1/transaction")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "chain": "evm",
                    "from": "0xA",
                    "to": "0xB",
                    "amount": "1.5",
                    "asset": "ETH",
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.clone().oneshot(create).await.unwrap();
        let created = body_json(response.into_response()).await;
        let id = created["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/transaction/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response.into_response()).await;
        assert_eq!(body["status"], "submitted");
        assert_eq!(body["amount"], "1.5");
        assert_eq!(body["asset"], "ETH");
        assert_eq!(body["history"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transaction_detail_not_found() {
        let app = app_with(MockAdapter::default());

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/transaction/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chains_listing() {
        let app = app_with(MockAdapter::default());

        let response = app
            .oneshot(Request::get("/api/v1/chains").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response.into_response()).await;
        assert_eq!(body["chains"], json!(["evm"]));
    }

    #[tokio::test]
    async fn test_stats_counts_records() {
        let app = app_with(MockAdapter::default());

        let create = Request::post("/api/v1/transaction")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "chain": "evm",
                    "from": "0xA",
                    "to": "0xB",
                    "amount": "1",
                    "asset": "ETH",
                })
                .to_string(),
            ))
            .unwrap();
        app.clone().oneshot(create).await.unwrap();

        let response = app
            .oneshot(Request::get("/api/v1/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response.into_response()).await;
        assert_eq!(body["submitted"], 1);
        assert_eq!(body["pending"], 0);
    }
}
