//! EVM family adapter with multi-RPC support and automatic failover
//!
//! Submission goes through `eth_sendTransaction`, so the configured
//! endpoint must be a wallet-bearing node that holds the sending account's
//! key. The gateway itself never signs.

use crate::asset::AssetSpec;
use crate::chain::{AssetTable, ChainAdapter, SubmitOutcome, TxStatus};
use crate::config::ChainConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::tracker::TransactionRequest;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, TransactionRequest as EthTransactionRequest, H256, U256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Adapter for EVM-compatible chains
pub struct EvmAdapter {
    chain: String,
    /// HTTP providers (multiple for failover)
    providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
    assets: AssetTable,
}

impl EvmAdapter {
    /// Create a new EVM adapter from chain configuration
    pub fn new(chain: &str, config: &ChainConfig) -> GatewayResult<Self> {
        let mut providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", chain, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if providers.is_empty() {
            return Err(GatewayError::Config(format!(
                "Chain {} has no valid RPC providers",
                chain
            )));
        }

        Ok(Self {
            chain: chain.to_string(),
            providers,
            current_provider: AtomicUsize::new(0),
            assets: AssetTable::from_config(config),
        })
    }

    /// Get the active HTTP provider
    fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.providers[idx % self.providers.len()]
    }

    /// Switch to next available provider
    fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.chain, next);
    }

    fn backend_error(&self, message: impl std::fmt::Display) -> GatewayError {
        GatewayError::Adapter {
            chain: self.chain.clone(),
            message: message.to_string(),
        }
    }

    fn parse_address(&self, address: &str) -> GatewayResult<Address> {
        address
            .parse()
            .map_err(|_| self.backend_error(format!("invalid address: {}", address)))
    }
}

/// Map a transaction receipt to the gateway status model
fn receipt_status(receipt: &ethers::types::TransactionReceipt) -> TxStatus {
    match receipt.status {
        Some(status) if status.is_zero() => TxStatus::Failed,
        // Pre-Byzantium receipts carry no status field; inclusion counts
        _ => TxStatus::Confirmed,
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
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
        let addr = self.parse_address(address)?;

        for _ in 0..self.providers.len() {
            match self.http().get_balance(addr, None).await {
                Ok(balance) => {
                    if balance > U256::from(u128::MAX) {
                        return Err(self.backend_error("balance exceeds representable range"));
                    }
                    return Ok(balance.as_u128());
                }
                Err(e) => {
                    warn!("Failed to get balance from chain {}: {}", self.chain, e);
                    self.failover();
                }
            }
        }

        Err(self.backend_error("all providers failed"))
    }

    async fn submit(&self, request: &TransactionRequest) -> GatewayResult<SubmitOutcome> {
        let native = self.native_asset();
        if !request.amount.spec.symbol.eq_ignore_ascii_case(&native.symbol) {
            return Err(self.backend_error(format!(
                "only native {} transfers are supported",
                native.symbol
            )));
        }

        let from = self.parse_address(&request.from)?;
        let to = self.parse_address(&request.to)?;

        let tx = EthTransactionRequest::new()
            .from(from)
            .to(to)
            .value(U256::from(request.amount.raw));

        // Submission is deliberately single-shot: failover retries could
        // double-spend if the first node accepted before erroring.
        let pending = self
            .http()
            .send_transaction(tx, None)
            .await
            .map_err(|e| self.backend_error(e))?;

        let hash = format!("{:?}", pending.tx_hash());
        debug!("Chain {} accepted transaction {}", self.chain, hash);

        Ok(SubmitOutcome::Accepted { hash })
    }

    async fn poll_status(&self, hash: &str) -> GatewayResult<TxStatus> {
        let tx_hash: H256 = hash
            .parse()
            .map_err(|_| self.backend_error(format!("invalid transaction hash: {}", hash)))?;

        for _ in 0..self.providers.len() {
            match self.http().get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt_status(&receipt)),
                Ok(None) => return Ok(TxStatus::Pending),
                Err(e) => {
                    warn!("Failed to get receipt from chain {}: {}", self.chain, e);
                    self.failover();
                }
            }
        }

        Err(self.backend_error("all providers failed"))
    }

    async fn health_check(&self) -> bool {
        match self.http().get_block_number().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Health check failed for chain {}: {}", self.chain, e);
                self.failover();
                false
            }
        }
    }
}
