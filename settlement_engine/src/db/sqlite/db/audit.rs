use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{AuditLogEntry, OrderId},
    traits::VersionedUpdate,
};

pub async fn insert_status_change(update: &VersionedUpdate, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO order_audit_log (
                order_id,
                actor,
                old_order_status,
                new_order_status,
                old_payment_status,
                new_payment_status,
                old_version,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
        "#,
    )
    .bind(update.order.id.as_str())
    .bind(update.actor.as_str())
    .bind(update.previous_order_status)
    .bind(update.order.order_status)
    .bind(update.previous_payment_status)
    .bind(update.order.payment_status)
    .bind(update.expected_version)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_audit_log(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_audit_log WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}
