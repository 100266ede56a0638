//! Solana adapter over JSON-RPC
//!
//! Balance and status queries use the standard RPC methods. Submission
//! uses `sendTransfer`, which vanilla validators do not expose: the
//! configured endpoint must be a custodial signer proxy that builds and
//! signs the transfer before forwarding it. The gateway itself never signs.

use crate::asset::AssetSpec;
use crate::chain::rpc::JsonRpcClient;
use crate::chain::{AssetTable, ChainAdapter, SubmitOutcome, TxStatus};
use crate::config::ChainConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::tracker::TransactionRequest;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

pub struct SolanaAdapter {
    chain: String,
    rpc: JsonRpcClient,
    assets: AssetTable,
}

impl SolanaAdapter {
    pub fn new(chain: &str, config: &ChainConfig) -> GatewayResult<Self> {
        Ok(Self {
            chain: chain.to_string(),
            rpc: JsonRpcClient::new(chain, &config.rpc_urls)?,
            assets: AssetTable::from_config(config),
        })
    }

    fn backend_error(&self, message: impl std::fmt::Display) -> GatewayError {
        GatewayError::Adapter {
            chain: self.chain.clone(),
            message: message.to_string(),
        }
    }
}

/// Map a `getSignatureStatuses` entry to the gateway status model
fn signature_status(entry: &Value) -> TxStatus {
    if entry.is_null() {
        // Not yet observed by the cluster
        return TxStatus::Pending;
    }
    if !entry["err"].is_null() {
        return TxStatus::Failed;
    }
    match entry["confirmationStatus"].as_str() {
        Some("finalized") => TxStatus::Confirmed,
        _ => TxStatus::Pending,
    }
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn name(&self) -> &str {
        &self.chain
    }

    fn asset(&self, symbol: &str) -> Option<AssetSpec> {
        self.assets.get(symbol)
    }

    fn native_asset(&self) -> AssetSpec {
        self.assets.native()
    }

    async fn query_balance(&self, address: &str) -> GatewayResult<u128> {
        let result = self.rpc.call("getBalance", json!([address])).await?;

        result["value"]
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| self.backend_error("getBalance returned no lamport value"))
    }

    async fn submit(&self, request: &TransactionRequest) -> GatewayResult<SubmitOutcome> {
        let native = self.native_asset();
        if !request.amount.spec.symbol.eq_ignore_ascii_case(&native.symbol) {
            return Err(self.backend_error(format!(
                "only native {} transfers are supported",
                native.symbol
            )));
        }

        let lamports = u64::try_from(request.amount.raw)
            .map_err(|_| self.backend_error("amount exceeds lamport range"))?;

        let result = self
            .rpc
            .call(
                "sendTransfer",
                json!([{
                    "from": request.from,
                    "to": request.to,
                    "lamports": lamports,
                }]),
            )
            .await?;

        let signature = result
            .as_str()
            .ok_or_else(|| self.backend_error("sendTransfer returned no signature"))?
            .to_string();

        debug!("Chain {} accepted transaction {}", self.chain, signature);
        Ok(SubmitOutcome::Accepted { hash: signature })
    }

    async fn poll_status(&self, hash: &str) -> GatewayResult<TxStatus> {
        let result = self
            .rpc
            .call(
                "getSignatureStatuses",
                json!([[hash], {"searchTransactionHistory": true}]),
            )
            .await?;

        let entry = &result["value"][0];
        Ok(signature_status(entry))
    }

    async fn health_check(&self) -> bool {
        matches!(
            self.rpc.call("getHealth", json!([])).await,
            Ok(Value::String(s)) if s == "ok"
        )
    }
}
