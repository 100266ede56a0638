//! Chain module - adapter capability set and per-chain dispatch
//!
//! This module provides:
//! - The `ChainAdapter` trait implemented once per chain family
//! - The adapter registry, built from configuration at startup
//! - Concrete adapters for EVM, Solana, and Bitcoin backends

pub mod bitcoin;
pub mod evm;
pub mod rpc;
pub mod solana;

pub use bitcoin::BitcoinAdapter;
pub use evm::EvmAdapter;
pub use solana::SolanaAdapter;

use crate::asset::AssetSpec;
use crate::config::{ChainConfig, ChainFamily, Settings};
use crate::error::{GatewayError, GatewayResult};
use crate::tracker::TransactionRequest;

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Outcome of handing a transaction to a chain backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Backend accepted the transaction and returned a provisional hash
    Accepted { hash: String },
    /// Backend accepted but has no hash yet; the caller must poll
    AcceptedPendingHash,
}

/// Chain-reported status of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Per-chain capability set for balance queries and transaction submission.
///
/// Implementations must be `Send + Sync` for concurrent use from the
/// gateway's async runtime, and must not block: RPC waits belong to the
/// caller's timeout budget.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// The chain identifier this adapter serves (e.g. "evm", "solana")
    fn name(&self) -> &str;

    /// Resolve an asset carried by this chain
    fn asset(&self, symbol: &str) -> Option<AssetSpec>;

    /// The chain's native asset
    fn native_asset(&self) -> AssetSpec;

    /// Query the balance of an address, in smallest units
    async fn query_balance(&self, address: &str) -> GatewayResult<u128>;

    /// Submit a transaction to the chain backend
    async fn submit(&self, request: &TransactionRequest) -> GatewayResult<SubmitOutcome>;

    /// Poll the status of a previously submitted transaction
    async fn poll_status(&self, hash: &str) -> GatewayResult<TxStatus>;

    /// Check backend connectivity
    async fn health_check(&self) -> bool;
}

impl fmt::Debug for dyn ChainAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainAdapter").field("name", &self.name()).finish()
    }
}

/// Asset lookup table shared by the concrete adapters
#[derive(Debug, Clone)]
pub struct AssetTable {
    assets: Vec<AssetSpec>,
}

impl AssetTable {
    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            assets: config.assets.iter().map(AssetSpec::from).collect(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<AssetSpec> {
        self.assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
    }

    /// The native asset is the first configured entry
    pub fn native(&self) -> AssetSpec {
        self.assets[0].clone()
    }
}

/// Maps chain identifiers to the adapter instance serving them.
///
/// Built once at startup from configuration and read-only afterwards.
/// Unknown identifiers always fail; there is no fallback adapter.
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
        }
    }

    /// Build a registry with one adapter per enabled chain
    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let registry = Self::new();

        for (name, chain_config) in settings.enabled_chains() {
            let adapter: Arc<dyn ChainAdapter> = match chain_config.family {
                ChainFamily::Evm => Arc::new(EvmAdapter::new(name, chain_config)?),
                ChainFamily::Solana => Arc::new(SolanaAdapter::new(name, chain_config)?),
                ChainFamily::Bitcoin => Arc::new(BitcoinAdapter::new(name, chain_config)?),
            };

            info!("Registered {:?} adapter for chain {}", chain_config.family, name);
            registry.register(adapter);
        }

        Ok(registry)
    }

    /// Register an adapter under its chain identifier
    pub fn register(&self, adapter: Arc<dyn ChainAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    /// Look up the adapter for a chain
    pub fn resolve(&self, chain: &str) -> GatewayResult<Arc<dyn ChainAdapter>> {
        self.adapters
            .get(chain)
            .map(|a| a.clone())
            .ok_or_else(|| GatewayError::UnsupportedChain {
                chain: chain.to_string(),
            })
    }

    /// All registered chain identifiers, sorted for stable output
    pub fn registered_chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self.adapters.iter().map(|e| e.key().clone()).collect();
        chains.sort_unstable();
        chains
    }

    /// Health check for all chains, run concurrently
    pub async fn health_check(&self) -> Vec<(String, bool)> {
        let checks: Vec<_> = self
            .adapters
            .iter()
            .map(|entry| {
                let chain = entry.key().clone();
                let adapter = entry.value().clone();
                async move {
                    let healthy = adapter.health_check().await;
                    (chain, healthy)
                }
            })
            .collect();

        let results = futures::future::join_all(checks).await;
        for (chain, healthy) in &results {
            crate::metrics::record_chain_health(chain, *healthy);
        }

        results
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A configurable adapter double for engine and poller tests
#[cfg(test)]
pub struct MockAdapter {
    pub name: &'static str,
    pub assets: Vec<AssetSpec>,
    /// `None` makes `query_balance` fail with an adapter error
    pub balance: Option<u128>,
    /// `None` makes `submit` fail with an adapter error
    pub submit_outcome: Option<SubmitOutcome>,
    /// `None` makes `poll_status` fail with an adapter error
    pub poll: Option<TxStatus>,
    /// Artificial latency applied to every call
    pub delay: Option<std::time::Duration>,
}

#[cfg(test)]
impl Default for MockAdapter {
    fn default() -> Self {
        Self {
            name: "evm",
            assets: vec![AssetSpec::new("ETH", 18)],
            balance: Some(1_500_000_000_000_000_000),
            submit_outcome: Some(SubmitOutcome::Accepted {
                hash: "0xabc123".to_string(),
            }),
            poll: Some(TxStatus::Pending),
            delay: None,
        }
    }
}

#[cfg(test)]
impl MockAdapter {
    async fn maybe_delay(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn backend_error(&self, message: &str) -> GatewayError {
        GatewayError::Adapter {
            chain: self.name.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ChainAdapter for MockAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn asset(&self, symbol: &str) -> Option<AssetSpec> {
        self.assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
    }

    fn native_asset(&self) -> AssetSpec {
        self.assets[0].clone()
    }

    async fn query_balance(&self, _address: &str) -> GatewayResult<u128> {
        self.maybe_delay().await;
        self.balance.ok_or_else(|| self.backend_error("balance query failed"))
    }

    async fn submit(&self, _request: &TransactionRequest) -> GatewayResult<SubmitOutcome> {
        self.maybe_delay().await;
        self.submit_outcome
            .clone()
            .ok_or_else(|| self.backend_error("node rejected transaction"))
    }

    async fn poll_status(&self, _hash: &str) -> GatewayResult<TxStatus> {
        self.maybe_delay().await;
        self.poll.ok_or_else(|| self.backend_error("status lookup failed"))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
