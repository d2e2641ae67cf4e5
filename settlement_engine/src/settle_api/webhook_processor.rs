//! The process-once wrapper that every webhook handler runs through.
//!
//! A handler runs at most once to completion for any `(provider, event_id)`. Redeliveries of a processed event get the
//! cached result back without the handler being invoked. A redelivery that races the first delivery waits for it to
//! finish, and a failed handler leaves the record `failed` so that the provider's next redelivery retries it.
use std::{fmt::Display, future::Future};

use chrono::Utc;
use log::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::time::Instant;

use crate::{
    db_types::{EventKey, IdempotencyRecord, LedgerStatus},
    traits::{ClaimOutcome, EventClaim, IdempotencyLedger, LedgerError},
    LedgerConfig,
    WebhookError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOnceResult<T> {
    /// True when the result came from the ledger rather than from running the handler.
    pub already_processed: bool,
    pub result: T,
}

#[derive(Clone)]
pub struct WebhookProcessor<L> {
    ledger: L,
    config: LedgerConfig,
}

impl<L> WebhookProcessor<L> {
    pub fn new(ledger: L, config: LedgerConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

impl<L> WebhookProcessor<L>
where L: IdempotencyLedger
{
    /// Runs `handler` unless the event has been processed before, and records its result.
    ///
    /// The handler's result is cached as JSON, so a replay returns a value identical to the original one.
    pub async fn process_once<T, E, F, Fut>(
        &self,
        claim: EventClaim,
        handler: F,
    ) -> Result<ProcessOnceResult<T>, WebhookError>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = claim.key.clone();
        match self.ledger.try_claim_event(&claim).await? {
            ClaimOutcome::Claimed(_) => trace!("📥️ Event {key} claimed"),
            ClaimOutcome::Existing(record) => {
                if let Some(result) = self.take_over_or_wait(record).await? {
                    debug!("📥️ Event {key} has already been processed. Returning the cached result.");
                    return Ok(ProcessOnceResult { already_processed: true, result });
                }
            },
        }
        self.run_handler(&key, handler).await
    }

    /// Deletes processed records older than the retention window. Returns `None` without touching the ledger if the
    /// retention window is shorter than the provider redelivery window.
    pub async fn purge_expired(&self) -> Result<Option<u64>, LedgerError> {
        if !self.config.retention_enabled() {
            return Ok(None);
        }
        let retention = chrono::Duration::from_std(self.config.retention)
            .map_err(|e| LedgerError::DatabaseError(format!("Invalid retention window. {e}")))?;
        let cutoff = Utc::now() - retention;
        let count = self.ledger.purge_processed_events(cutoff).await?;
        Ok(Some(count))
    }

    /// Deals with an event that is already in the ledger. Returns the cached result if there is one, or `None` once
    /// this caller has taken ownership of the event and should run the handler.
    async fn take_over_or_wait<T: DeserializeOwned>(
        &self,
        mut record: IdempotencyRecord,
    ) -> Result<Option<T>, WebhookError> {
        let key = record.key();
        let deadline = Instant::now() + self.config.in_flight_wait;
        loop {
            match record.status {
                LedgerStatus::Processed => return decode_cached(&record).map(Some),
                LedgerStatus::Failed => {
                    if let Some(reclaimed) = self.ledger.reclaim_failed_event(&key).await? {
                        info!("📥️ Retrying failed event {key} (attempt {})", reclaimed.attempts);
                        return Ok(None);
                    }
                },
                LedgerStatus::InFlight if self.lease_expired(&record) => {
                    if let Some(reclaimed) = self.ledger.reclaim_stale_event(&key, record.attempts).await? {
                        warn!(
                            "📥️ Event {key} was abandoned in flight since {}. Taking it over (attempt {}).",
                            record.claimed_at, reclaimed.attempts
                        );
                        return Ok(None);
                    }
                },
                LedgerStatus::InFlight => {
                    if Instant::now() >= deadline {
                        debug!("📥️ Event {key} is still in flight. Asking the provider to redeliver later.");
                        return Err(WebhookError::EventInFlight(key));
                    }
                    tokio::time::sleep(self.config.poll_interval).await;
                },
            }
            record =
                self.ledger.fetch_event(&key).await?.ok_or_else(|| LedgerError::RecordNotFound(key.clone()))?;
        }
    }

    fn lease_expired(&self, record: &IdempotencyRecord) -> bool {
        chrono::Duration::from_std(self.config.lease_timeout)
            .map(|lease| Utc::now() - record.claimed_at > lease)
            .unwrap_or(false)
    }

    async fn run_handler<T, E, F, Fut>(&self, key: &EventKey, handler: F) -> Result<ProcessOnceResult<T>, WebhookError>
    where
        T: Serialize,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let outcome = handler().await.map_err(|e| e.to_string()).and_then(|result| {
            serde_json::to_string(&result)
                .map(|cached| (result, cached))
                .map_err(|e| format!("Could not serialize the handler result. {e}"))
        });
        match outcome {
            Ok((result, cached)) => {
                self.ledger.mark_event_processed(key, &cached).await?;
                trace!("📥️ Event {key} processed");
                Ok(ProcessOnceResult { already_processed: false, result })
            },
            Err(message) => {
                warn!("📥️ Handler for event {key} failed. {message}");
                self.ledger.mark_event_failed(key, &message).await?;
                Err(WebhookError::HandlerFailed(message))
            },
        }
    }
}

fn decode_cached<T: DeserializeOwned>(record: &IdempotencyRecord) -> Result<T, WebhookError> {
    let cached = record.result.as_deref().ok_or_else(|| {
        LedgerError::DatabaseError(format!("Processed event {} has no cached result", record.key()))
    })?;
    serde_json::from_str(cached).map_err(|e| {
        WebhookError::Ledger(LedgerError::DatabaseError(format!(
            "Cached result for event {} could not be decoded. {e}",
            record.key()
        )))
    })
}
