//! Bitcoin adapter over Bitcoin Core wallet RPC
//!
//! Targets a Core node with a loaded wallet: balances come from
//! `getreceivedbyaddress` (the address must be known to the wallet),
//! submission from `sendtoaddress` (the wallet selects inputs, so the
//! request's `from` address is informational only), and status from
//! `gettransaction` confirmation counts.

use crate::asset::AssetSpec;
use crate::chain::rpc::JsonRpcClient;
use crate::chain::{AssetTable, ChainAdapter, SubmitOutcome, TxStatus};
use crate::config::ChainConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::tracker::TransactionRequest;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

/// Confirmations required before a transaction counts as final
const CONFIRMATION_TARGET: i64 = 1;

pub struct BitcoinAdapter {
    chain: String,
    rpc: JsonRpcClient,
    assets: AssetTable,
}

impl BitcoinAdapter {
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

    /// Convert a Core-style decimal coin value to smallest units
    fn to_raw(&self, coins: f64) -> GatewayResult<u128> {
        if !coins.is_finite() || coins < 0.0 {
            return Err(self.backend_error(format!("invalid coin amount: {}", coins)));
        }
        let scale = 10f64.powi(i32::from(self.native_asset().decimals));
        Ok((coins * scale).round() as u128)
    }
}

/// Map a `gettransaction` confirmation count to the gateway status model
fn confirmation_status(confirmations: i64) -> TxStatus {
    if confirmations < 0 {
        // Conflicted: a double spend of its inputs was confirmed instead
        TxStatus::Failed
    } else if confirmations >= CONFIRMATION_TARGET {
        TxStatus::Confirmed
    } else {
        TxStatus::Pending
    }
}

#[async_trait]
impl ChainAdapter for BitcoinAdapter {
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
        let result = self
            .rpc
            .call("getreceivedbyaddress", json!([address, CONFIRMATION_TARGET]))
            .await?;

        let coins = result
            .as_f64()
            .ok_or_else(|| self.backend_error("getreceivedbyaddress returned no amount"))?;

        self.to_raw(coins)
    }

    async fn submit(&self, request: &TransactionRequest) -> GatewayResult<SubmitOutcome> {
        let native = self.native_asset();
        if !request.amount.spec.symbol.eq_ignore_ascii_case(&native.symbol) {
            return Err(self.backend_error(format!(
                "only native {} transfers are supported",
                native.symbol
            )));
        }

        // Core takes the amount as a decimal coin string
        let result = self
            .rpc
            .call("sendtoaddress", json!([request.to, request.amount.display()]))
            .await?;

        let txid = result
            .as_str()
            .ok_or_else(|| self.backend_error("sendtoaddress returned no txid"))?
            .to_string();

        debug!("Chain {} accepted transaction {}", self.chain, txid);
        Ok(SubmitOutcome::Accepted { hash: txid })
    }

    async fn poll_status(&self, hash: &str) -> GatewayResult<TxStatus> {
        let result = self.rpc.call("gettransaction", json!([hash])).await?;

        let confirmations = result["confirmations"]
            .as_i64()
            .ok_or_else(|| self.backend_error("gettransaction returned no confirmations"))?;

        Ok(confirmation_status(confirmations))
    }

    async fn health_check(&self) -> bool {
        self.rpc.call("getblockcount", json!([])).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetAmount;
    use crate::config::{AssetConfig, ChainFamily};

    fn btc_adapter() -> BitcoinAdapter {
        BitcoinAdapter::new(
            "bitcoin",
            &ChainConfig {
                family: ChainFamily::Bitcoin,
                rpc_urls: vec!["http://localhost:8332".to_string()],
                assets: vec![AssetConfig {
                    symbol: "BTC".to_string(),
                    decimals: 8,
                }],
                enabled: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_to_raw_converts_coins_to_sats() {
        let adapter = btc_adapter();
        assert_eq!(adapter.to_raw(0.05).unwrap(), 5_000_000);
        assert_eq!(adapter.to_raw(1.0).unwrap(), 100_000_000);
        assert_eq!(adapter.to_raw(0.00000001).unwrap(), 1);
        assert_eq!(adapter.to_raw(0.0).unwrap(), 0);
    }

    #[test]
    fn test_to_raw_rejects_invalid() {
        let adapter = btc_adapter();
        assert!(adapter.to_raw(-0.1).is_err());
        assert!(adapter.to_raw(f64::NAN).is_err());
    }

    #[test]
    fn test_confirmation_status_mapping() {
        assert_eq!(confirmation_status(-1), TxStatus::Failed);
        assert_eq!(confirmation_status(0), TxStatus::Pending);
        assert_eq!(confirmation_status(1), TxStatus::Confirmed);
        assert_eq!(confirmation_status(6), TxStatus::Confirmed);
    }

    #[test]
    fn test_submit_amount_rendering() {
        // sendtoaddress receives the canonical decimal form
        let amount = AssetAmount::from_raw(5_000_000, AssetSpec::new("BTC", 8));
        assert_eq!(amount.display(), "0.05");
    }
}
