use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{EventKey, IdempotencyRecord},
    traits::{ClaimOutcome, EventClaim},
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No ledger record exists for event {0}")]
    RecordNotFound(EventKey),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// A durable record of which external events have been seen, keyed on `(provider, event_id)`.
///
/// At most one record exists per key. Records move `in_flight -> processed` or `in_flight -> failed`, and a failed
/// (or abandoned in-flight) record may be reclaimed so that a redelivery can retry it. Processed records are never
/// updated again.
#[allow(async_fn_in_trait)]
pub trait IdempotencyLedger {
    /// Atomically inserts an in-flight placeholder if no record exists for the key. If a record already exists it is
    /// returned untouched as [`ClaimOutcome::Existing`].
    async fn try_claim_event(&self, claim: &EventClaim) -> Result<ClaimOutcome, LedgerError>;

    /// Moves a `failed` record back to `in_flight` and bumps its attempt count. Returns `None` if another worker got
    /// there first.
    async fn reclaim_failed_event(&self, key: &EventKey) -> Result<Option<IdempotencyRecord>, LedgerError>;

    /// Takes over an in-flight record whose lease has expired. The takeover only succeeds if the record is still at
    /// `attempts`, so two workers cannot both reclaim the same abandoned lease.
    async fn reclaim_stale_event(
        &self,
        key: &EventKey,
        attempts: i64,
    ) -> Result<Option<IdempotencyRecord>, LedgerError>;

    /// Stores the serialized handler result and marks the record processed.
    async fn mark_event_processed(&self, key: &EventKey, result: &str) -> Result<(), LedgerError>;

    async fn mark_event_failed(&self, key: &EventKey, error: &str) -> Result<(), LedgerError>;

    async fn fetch_event(&self, key: &EventKey) -> Result<Option<IdempotencyRecord>, LedgerError>;

    /// All records for the tenant whose authenticity could not be fully established, newest first.
    async fn fetch_unverified_events(&self, tenant_id: &str) -> Result<Vec<IdempotencyRecord>, LedgerError>;

    /// Deletes processed records older than `cutoff`. Returns the number of records removed.
    async fn purge_processed_events(&self, cutoff: DateTime<Utc>) -> Result<u64, LedgerError>;
}
