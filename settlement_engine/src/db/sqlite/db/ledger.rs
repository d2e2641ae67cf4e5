//! Idempotency ledger queries. Every state change is a single conditional statement, so two workers racing on the
//! same event can never both win.
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{EventKey, IdempotencyRecord, LedgerStatus},
    traits::EventClaim,
};

/// Inserts an in-flight placeholder. Returns `None` if a record for the key already exists.
pub async fn try_claim(
    claim: &EventClaim,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<IdempotencyRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO webhook_events (provider, event_id, event_type, status, tenant_id, verification, attempts, claimed_at)
            VALUES ($1, $2, $3, $4, $5, $6, 1, $7)
            ON CONFLICT (provider, event_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(claim.key.provider.as_str())
    .bind(claim.key.event_id.as_str())
    .bind(claim.event_type.as_str())
    .bind(LedgerStatus::InFlight)
    .bind(claim.tenant_id.as_deref())
    .bind(claim.verification)
    .bind(now)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_event(key: &EventKey, conn: &mut SqliteConnection) -> Result<Option<IdempotencyRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM webhook_events WHERE provider = $1 AND event_id = $2")
        .bind(key.provider.as_str())
        .bind(key.event_id.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn reclaim_failed(
    key: &EventKey,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<IdempotencyRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE webhook_events SET status = $1, attempts = attempts + 1, claimed_at = $2
            WHERE provider = $3 AND event_id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(LedgerStatus::InFlight)
    .bind(now)
    .bind(key.provider.as_str())
    .bind(key.event_id.as_str())
    .bind(LedgerStatus::Failed)
    .fetch_optional(conn)
    .await
}

pub async fn reclaim_stale(
    key: &EventKey,
    attempts: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<IdempotencyRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE webhook_events SET attempts = attempts + 1, claimed_at = $1
            WHERE provider = $2 AND event_id = $3 AND status = $4 AND attempts = $5
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(key.provider.as_str())
    .bind(key.event_id.as_str())
    .bind(LedgerStatus::InFlight)
    .bind(attempts)
    .fetch_optional(conn)
    .await
}

/// Returns `false` if there was no in-flight record to update.
pub async fn mark_processed(
    key: &EventKey,
    result: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
            UPDATE webhook_events SET status = $1, result = $2, processed_at = $3, last_error = NULL
            WHERE provider = $4 AND event_id = $5 AND status = $6;
        "#,
    )
    .bind(LedgerStatus::Processed)
    .bind(result)
    .bind(now)
    .bind(key.provider.as_str())
    .bind(key.event_id.as_str())
    .bind(LedgerStatus::InFlight)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() == 1)
}

/// Returns `false` if there was no in-flight record to update.
pub async fn mark_failed(key: &EventKey, error: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
            UPDATE webhook_events SET status = $1, last_error = $2
            WHERE provider = $3 AND event_id = $4 AND status = $5;
        "#,
    )
    .bind(LedgerStatus::Failed)
    .bind(error)
    .bind(key.provider.as_str())
    .bind(key.event_id.as_str())
    .bind(LedgerStatus::InFlight)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn fetch_unverified(
    tenant_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<IdempotencyRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM webhook_events
            WHERE tenant_id = $1 AND verification <> 'verified'
            ORDER BY claimed_at DESC;
        "#,
    )
    .bind(tenant_id)
    .fetch_all(conn)
    .await
}

pub async fn purge_processed(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        r#"
            DELETE FROM webhook_events
            WHERE status = $1 AND processed_at IS NOT NULL AND julianday(processed_at) < julianday($2);
        "#,
    )
    .bind(LedgerStatus::Processed)
    .bind(cutoff)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}
