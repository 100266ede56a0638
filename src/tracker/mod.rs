//! Transaction record store and lifecycle state machine
//!
//! The tracker is the sole mutator of record status. Transitions are
//! monotonic: `Pending -> Submitted -> Confirmed | Failed`, with a direct
//! `Pending -> Failed` path for immediate submission rejection. Terminal
//! records are never deleted, only inspected.

pub mod poller;

pub use poller::StatusPoller;

use crate::asset::AssetAmount;
use crate::error::{GatewayError, GatewayResult};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// A transfer intent, immutable once dispatched
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub chain: String,
    pub from: String,
    pub to: String,
    pub amount: AssetAmount,
}

/// Why a record reached the `Failed` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend rejected the submission outright
    SubmissionError,
    /// The bounded poll window elapsed without a chain-side resolution
    SubmissionTimeout,
    /// The chain executed and rejected the transaction
    ChainRejected,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::SubmissionError => "submission_error",
            FailureKind::SubmissionTimeout => "submission_timeout",
            FailureKind::ChainRejected => "chain_rejected",
        }
    }
}

/// Lifecycle state of a tracked transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed(FailureKind),
}

impl RecordStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Confirmed | RecordStatus::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Submitted => "submitted",
            RecordStatus::Confirmed => "confirmed",
            RecordStatus::Failed(_) => "failed",
        }
    }
}

/// One timestamped state transition, kept for audit
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: RecordStatus,
    pub at: DateTime<Utc>,
}

/// A tracked transaction
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub chain: String,
    pub from: String,
    pub to: String,
    pub amount: AssetAmount,
    /// Provisional hash, set once the backend accepts
    pub hash: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<StatusChange>,
}

impl TransactionRecord {
    fn new(request: TransactionRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            chain: request.chain,
            from: request.from,
            to: request.to,
            amount: request.amount,
            hash: None,
            status: RecordStatus::Pending,
            created_at: now,
            updated_at: now,
            history: vec![StatusChange {
                status: RecordStatus::Pending,
                at: now,
            }],
        }
    }

    /// Apply a transition, enforcing the monotonic state machine
    fn transition(&mut self, next: RecordStatus) -> GatewayResult<()> {
        let valid = matches!(
            (self.status, next),
            (RecordStatus::Pending, RecordStatus::Submitted)
                | (RecordStatus::Pending, RecordStatus::Failed(_))
                | (RecordStatus::Submitted, RecordStatus::Confirmed)
                | (RecordStatus::Submitted, RecordStatus::Failed(_))
        );

        if !valid {
            return Err(GatewayError::InvalidStateTransition {
                from: self.status.label().to_string(),
                to: next.label().to_string(),
            });
        }

        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        self.history.push(StatusChange { status: next, at: now });

        info!(
            "Transaction {} on chain {} is now {}",
            self.id,
            self.chain,
            next.label()
        );
        Ok(())
    }
}

/// Per-status record counts
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackerStats {
    pub pending: u64,
    pub submitted: u64,
    pub confirmed: u64,
    pub failed: u64,
}

/// In-memory record store; writes are serialized per record
pub struct TransactionTracker {
    records: DashMap<Uuid, TransactionRecord>,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Create a `Pending` record for a dispatched request
    pub fn create(&self, request: TransactionRequest) -> TransactionRecord {
        let record = TransactionRecord::new(request);
        debug!(
            "Created transaction record {} for chain {}",
            record.id, record.chain
        );
        self.records.insert(record.id, record.clone());
        record
    }

    /// Record backend acceptance with a provisional hash
    pub fn mark_submitted(&self, id: Uuid, hash: &str) -> GatewayResult<TransactionRecord> {
        let mut entry = self.records.get_mut(&id).ok_or_else(|| not_found(id))?;
        entry.transition(RecordStatus::Submitted)?;
        entry.hash = Some(hash.to_string());
        Ok(entry.clone())
    }

    /// Move a record to a terminal status
    pub fn mark_terminal(&self, id: Uuid, status: RecordStatus) -> GatewayResult<TransactionRecord> {
        if !status.is_terminal() {
            return Err(GatewayError::Internal(format!(
                "{} is not a terminal status",
                status.label()
            )));
        }

        let mut entry = self.records.get_mut(&id).ok_or_else(|| not_found(id))?;
        entry.transition(status)?;
        Ok(entry.clone())
    }

    /// Fetch a consistent snapshot of a record
    pub fn get(&self, id: Uuid) -> GatewayResult<TransactionRecord> {
        self.records
            .get(&id)
            .map(|r| r.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Snapshot of all records awaiting chain-side resolution
    pub fn submitted(&self) -> Vec<TransactionRecord> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Submitted)
            .map(|r| r.clone())
            .collect()
    }

    /// Per-status counts for the stats endpoint and metrics
    pub fn stats(&self) -> TrackerStats {
        let mut stats = TrackerStats::default();
        for record in self.records.iter() {
            match record.status {
                RecordStatus::Pending => stats.pending += 1,
                RecordStatus::Submitted => stats.submitted += 1,
                RecordStatus::Confirmed => stats.confirmed += 1,
                RecordStatus::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: Uuid) -> GatewayError {
    GatewayError::TransactionNotFound {
        tx_id: id.to_string(),
    }
}
