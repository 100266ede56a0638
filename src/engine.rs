//! Dispatch engine orchestrating balance and transaction requests
//!
//! The engine is the only surface the HTTP layer calls. It resolves the
//! adapter for a chain, bounds every backend call with a timeout, and
//! drives record transitions through the tracker. Validation failures are
//! detected before any record exists; adapter failures after a record is
//! created always leave it in a terminal, inspectable state.

use crate::asset::AssetAmount;
use crate::chain::{AdapterRegistry, SubmitOutcome};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::tracker::{FailureKind, RecordStatus, TransactionRecord, TransactionRequest, TransactionTracker};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

pub struct DispatchEngine {
    registry: Arc<AdapterRegistry>,
    tracker: Arc<TransactionTracker>,
    config: GatewayConfig,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        tracker: Arc<TransactionTracker>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            registry,
            tracker,
            config,
        }
    }

    fn adapter_wait(&self) -> Duration {
        Duration::from_millis(self.config.adapter_timeout_ms)
    }

    /// Query the native-asset balance of an address on a chain
    pub async fn get_balance(&self, chain: &str, address: &str) -> GatewayResult<AssetAmount> {
        let adapter = self.registry.resolve(chain)?;

        let raw = match timeout(self.adapter_wait(), adapter.query_balance(address)).await {
            Ok(result) => result.map_err(|e| {
                crate::metrics::record_balance_query(chain, false);
                e
            })?,
            Err(_) => {
                crate::metrics::record_balance_query(chain, false);
                return Err(GatewayError::AdapterTimeout {
                    chain: chain.to_string(),
                    operation: "balance query".to_string(),
                });
            }
        };

        crate::metrics::record_balance_query(chain, true);
        let balance = AssetAmount::from_raw(raw, adapter.native_asset());
        debug!("Balance of {} on chain {}: {}", address, chain, balance);
        Ok(balance)
    }

    /// Validate, record, and submit a transfer
    pub async fn create_transaction(
        &self,
        chain: &str,
        from: &str,
        to: &str,
        amount: &str,
        asset: &str,
    ) -> GatewayResult<TransactionRecord> {
        // Validation happens before any record exists
        let adapter = self.registry.resolve(chain)?;
        let spec = adapter
            .asset(asset)
            .ok_or_else(|| GatewayError::UnsupportedAsset {
                chain: chain.to_string(),
                asset: asset.to_string(),
            })?;
        let amount = AssetAmount::parse(amount, &spec)?;

        let request = TransactionRequest {
            chain: chain.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            amount,
        };
        let record = self.tracker.create(request.clone());

        match timeout(self.adapter_wait(), adapter.submit(&request)).await {
            Ok(Ok(SubmitOutcome::Accepted { hash })) => {
                crate::metrics::record_tx_submitted(chain);
                self.tracker.mark_submitted(record.id, &hash)
            }
            Ok(Ok(SubmitOutcome::AcceptedPendingHash)) => {
                // Ambiguous acceptance: no hash yet, the caller must poll
                warn!(
                    "Chain {} accepted transaction {} without a hash",
                    chain, record.id
                );
                self.tracker.get(record.id)
            }
            Ok(Err(e)) => {
                if e.is_retryable() {
                    warn!("Transient submission failure on chain {}: {}", chain, e);
                } else {
                    error!("Submission rejected on chain {}: {}", chain, e);
                }
                self.fail_record(&record);
                Err(e)
            }
            Err(_) => {
                self.fail_record(&record);
                Err(GatewayError::AdapterTimeout {
                    chain: chain.to_string(),
                    operation: "transaction submission".to_string(),
                })
            }
        }
    }

    /// Fetch a tracked transaction record
    pub fn get_transaction(&self, id: uuid::Uuid) -> GatewayResult<TransactionRecord> {
        self.tracker.get(id)
    }

    fn fail_record(&self, record: &TransactionRecord) {
        crate::metrics::record_tx_failed(&record.chain);
        if let Err(e) = self
            .tracker
            .mark_terminal(record.id, RecordStatus::Failed(FailureKind::SubmissionError))
        {
            error!("Failed to mark record {} failed: {}", record.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetSpec;
    use crate::chain::MockAdapter;
    use crate::tracker::TrackerStats;

    fn engine_with(adapter: MockAdapter) -> DispatchEngine {
        let registry = Arc::new(AdapterRegistry::new());
        registry.register(Arc::new(adapter));

        DispatchEngine::new(
            registry,
            Arc::new(TransactionTracker::new()),
            GatewayConfig {
                poll_interval_ms: 500,
                adapter_timeout_ms: 100,
                submission_timeout_secs: 120,
                health_check_interval_secs: 30,
            },
        )
    }

    fn assert_no_records(stats: TrackerStats) {
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.submitted, 0);
        assert_eq!(stats.confirmed, 0);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_get_balance_normalizes() {
        let engine = engine_with(MockAdapter::default());

        let balance = engine.get_balance("evm", "0xA").await.unwrap();
        assert_eq!(balance.spec, AssetSpec::new("ETH", 18));
        assert_eq!(balance.display(), "1.5");
        assert_eq!(balance.to_string(), "1.5 ETH");
    }

    #[tokio::test]
    async fn test_get_balance_unknown_chain() {
        let engine = engine_with(MockAdapter::default());

        let err = engine.get_balance("ripple", "rA").await.unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedChain { .. }));
    }

    #[tokio::test]
    async fn test_get_balance_adapter_timeout() {
        let engine = engine_with(MockAdapter {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });

        let err = engine.get_balance("evm", "0xA").await.unwrap_err();
        assert!(matches!(err, GatewayError::AdapterTimeout { .. }));
    }

    #[tokio::test]
    async fn test_create_transaction_happy_path() {
        let engine = engine_with(MockAdapter::default());

        let record = engine
            .create_transaction("evm", "0xA", "0xB", "1.5", "ETH")
            .await
            .unwrap();

        assert_eq!(record.status, RecordStatus::Submitted);
        assert!(!record.hash.as_deref().unwrap().is_empty());
        assert_eq!(record.amount.raw, 1_500_000_000_000_000_000);

        let statuses: Vec<_> = record.history.iter().map(|c| c.status.label()).collect();
        assert_eq!(statuses, vec!["pending", "submitted"]);
    }

    #[tokio::test]
    async fn test_create_transaction_unknown_chain_creates_no_record() {
        let engine = engine_with(MockAdapter::default());

        let err = engine
            .create_transaction("ripple", "rA", "rB", "1", "XRP")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedChain { .. }));
        assert_no_records(engine.tracker.stats());
    }

    #[tokio::test]
    async fn test_create_transaction_rejects_negative_amount() {
        let engine = engine_with(MockAdapter::default());

        let err = engine
            .create_transaction("evm", "0xA", "0xB", "-1", "ETH")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedAmount { .. }));
        assert_no_records(engine.tracker.stats());
    }

    #[tokio::test]
    async fn test_create_transaction_rejects_excess_precision() {
        let engine = engine_with(MockAdapter {
            assets: vec![AssetSpec::new("USDC", 6)],
            ..Default::default()
        });

        let err = engine
            .create_transaction("evm", "0xA", "0xB", "1.0000001", "USDC")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedAmount { .. }));
        assert_no_records(engine.tracker.stats());
    }

    #[tokio::test]
    async fn test_create_transaction_rejects_unknown_asset() {
        let engine = engine_with(MockAdapter::default());

        let err = engine
            .create_transaction("evm", "0xA", "0xB", "1", "DOGE")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedAsset { .. }));
        assert_no_records(engine.tracker.stats());
    }

    #[tokio::test]
    async fn test_submission_failure_leaves_terminal_record() {
        let engine = engine_with(MockAdapter {
            submit_outcome: None,
            ..Default::default()
        });

        let err = engine
            .create_transaction("evm", "0xA", "0xB", "1.5", "ETH")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Adapter { .. }));

        let stats = engine.tracker.stats();
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_submission_timeout_leaves_terminal_record() {
        let engine = engine_with(MockAdapter {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });

        let err = engine
            .create_transaction("evm", "0xA", "0xB", "1.5", "ETH")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AdapterTimeout { .. }));

        let stats = engine.tracker.stats();
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_ambiguous_acceptance_stays_pending() {
        let engine = engine_with(MockAdapter {
            submit_outcome: Some(SubmitOutcome::AcceptedPendingHash),
            ..Default::default()
        });

        let record = engine
            .create_transaction("evm", "0xA", "0xB", "1.5", "ETH")
            .await
            .unwrap();
        assert_eq!(record.status, RecordStatus::Pending);
        assert!(record.hash.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_balance_queries() {
        let engine = Arc::new(engine_with(MockAdapter::default()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine.get_balance("evm", &format!("0x{:040x}", i)).await
                })
            })
            .collect();

        for handle in handles {
            let balance = handle.await.unwrap().unwrap();
            assert_eq!(balance.display(), "1.5");
        }
    }
}
