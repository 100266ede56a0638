//! Minimal JSON-RPC 2.0 client with multi-endpoint failover
//!
//! Transport for the non-EVM adapters. Transport failures rotate to the
//! next configured endpoint; an error answered by the node itself is
//! returned as-is, since every endpoint would repeat it.

use crate::error::{GatewayError, GatewayResult};

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

pub struct JsonRpcClient {
    chain: String,
    client: reqwest::Client,
    urls: Vec<String>,
    /// Current active endpoint index
    current: AtomicUsize,
}

impl JsonRpcClient {
    pub fn new(chain: &str, urls: &[String]) -> GatewayResult<Self> {
        if urls.is_empty() {
            return Err(GatewayError::Config(format!(
                "Chain {} has no RPC URLs configured",
                chain
            )));
        }

        // Safety net below the engine's own per-call timeout
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self {
            chain: chain.to_string(),
            client,
            urls: urls.to_vec(),
            current: AtomicUsize::new(0),
        })
    }

    fn url(&self) -> &str {
        let idx = self.current.load(Ordering::Relaxed);
        &self.urls[idx % self.urls.len()]
    }

    fn failover(&self) {
        let current = self.current.load(Ordering::Relaxed);
        let next = (current + 1) % self.urls.len();
        self.current.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to endpoint {}", self.chain, next);
    }

    fn backend_error(&self, message: impl std::fmt::Display) -> GatewayError {
        GatewayError::Adapter {
            chain: self.chain.clone(),
            message: message.to_string(),
        }
    }

    /// Issue a JSON-RPC call, rotating endpoints on transport failure
    pub async fn call(&self, method: &str, params: Value) -> GatewayResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        for _ in 0..self.urls.len() {
            let response = self.client.post(self.url()).json(&body).send().await;

            match response {
                Ok(response) => {
                    let parsed: RpcResponse = response
                        .json()
                        .await
                        .map_err(|e| self.backend_error(format!("invalid RPC response: {}", e)))?;

                    if let Some(error) = parsed.error {
                        return Err(self.backend_error(format!(
                            "{} failed: {} (code {})",
                            method, error.message, error.code
                        )));
                    }

                    return parsed
                        .result
                        .ok_or_else(|| self.backend_error(format!("{} returned no result", method)));
                }
                Err(e) => {
                    warn!("Chain {} endpoint unreachable: {}", self.chain, e);
                    self.failover();
                }
            }
        }

        Err(self.backend_error("all endpoints failed"))
    }
}
