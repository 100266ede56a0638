//! Background polling of submitted transactions until finality
//!
//! The poller sweeps every `Submitted` record on an interval and asks the
//! owning adapter for its status. A record that stays unresolved past the
//! configured submission window fails with `SubmissionTimeout`. Stopping
//! the poller never touches record state: anything still `Submitted` at
//! shutdown stays `Submitted` for later resumption.

use super::{FailureKind, RecordStatus, TransactionRecord, TransactionTracker};
use crate::chain::{AdapterRegistry, TxStatus};
use crate::config::GatewayConfig;
use crate::error::GatewayResult;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, timeout};
use tracing::{debug, error, info, warn};

pub struct StatusPoller {
    tracker: Arc<TransactionTracker>,
    registry: Arc<AdapterRegistry>,
    config: GatewayConfig,
    /// Shutdown flag
    shutdown: Arc<RwLock<bool>>,
}

impl StatusPoller {
    pub fn new(
        tracker: Arc<TransactionTracker>,
        registry: Arc<AdapterRegistry>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            tracker,
            registry,
            config,
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Main polling loop
    pub async fn run(&self) -> GatewayResult<()> {
        let mut poll_interval = interval(Duration::from_millis(self.config.poll_interval_ms));

        info!("Status poller started");

        loop {
            poll_interval.tick().await;

            if *self.shutdown.read().await {
                break;
            }

            self.poll_once().await;
        }

        info!("Status poller stopped");
        Ok(())
    }

    /// Stop the poller without touching in-flight records
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        info!("Status poller shutdown initiated");
    }

    /// Sweep all submitted records once
    pub async fn poll_once(&self) {
        for record in self.tracker.submitted() {
            self.check_record(&record).await;
        }
    }

    async fn check_record(&self, record: &TransactionRecord) {
        // Submitted records always carry a provisional hash
        let hash = match record.hash.as_deref() {
            Some(hash) => hash,
            None => {
                error!("Submitted record {} has no hash", record.id);
                return;
            }
        };

        let adapter = match self.registry.resolve(&record.chain) {
            Ok(adapter) => adapter,
            Err(e) => {
                // Adapter set changed under us; the window still bounds the record
                warn!("Cannot poll record {}: {}", record.id, e);
                self.fail_if_window_elapsed(record);
                return;
            }
        };

        let wait = Duration::from_millis(self.config.adapter_timeout_ms);
        match timeout(wait, adapter.poll_status(hash)).await {
            Ok(Ok(TxStatus::Confirmed)) => {
                if let Ok(updated) = self.mark(record, RecordStatus::Confirmed) {
                    crate::metrics::record_tx_confirmed(&updated.chain);
                }
            }
            Ok(Ok(TxStatus::Failed)) => {
                if let Ok(updated) =
                    self.mark(record, RecordStatus::Failed(FailureKind::ChainRejected))
                {
                    crate::metrics::record_tx_failed(&updated.chain);
                }
            }
            Ok(Ok(TxStatus::Pending)) => {
                debug!("Transaction {} still pending on chain {}", record.id, record.chain);
                self.fail_if_window_elapsed(record);
            }
            Ok(Err(e)) => {
                warn!("Status poll failed for {}: {}", record.id, e);
                self.fail_if_window_elapsed(record);
            }
            Err(_) => {
                warn!(
                    "Status poll timed out for {} on chain {}",
                    record.id, record.chain
                );
                self.fail_if_window_elapsed(record);
            }
        }
    }

    /// Fail a record whose submission window has fully elapsed
    fn fail_if_window_elapsed(&self, record: &TransactionRecord) {
        // updated_at marks the transition into Submitted
        let age = Utc::now().signed_duration_since(record.updated_at);
        let window = chrono::Duration::seconds(self.config.submission_timeout_secs as i64);

        if age > window {
            warn!(
                "Transaction {} unresolved after {}s, marking failed",
                record.id, self.config.submission_timeout_secs
            );
            if let Ok(updated) =
                self.mark(record, RecordStatus::Failed(FailureKind::SubmissionTimeout))
            {
                crate::metrics::record_tx_failed(&updated.chain);
            }
        }
    }

    fn mark(
        &self,
        record: &TransactionRecord,
        status: RecordStatus,
    ) -> GatewayResult<TransactionRecord> {
        self.tracker.mark_terminal(record.id, status).map_err(|e| {
            error!("Failed to transition record {}: {}", record.id, e);
            e
        })
    }
}
