use sqlx::SqliteConnection;

use crate::db_types::{NewRefund, OrderId, RefundRecord};

/// Records a refund. Returns `false` if a refund with the same id has already been recorded, in which case nothing is
/// written.
pub async fn insert_refund(refund: &NewRefund, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO refunds (refund_id, order_id, amount, source, reason)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (refund_id) DO NOTHING;
        "#,
    )
    .bind(refund.refund_id.as_str())
    .bind(refund.order_id.as_str())
    .bind(refund.amount)
    .bind(refund.source)
    .bind(refund.reason.as_deref())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn refund_exists(refund_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM refunds WHERE refund_id = $1").bind(refund_id).fetch_one(conn).await?;
    Ok(count > 0)
}

pub async fn fetch_refunds_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<RefundRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM refunds WHERE order_id = $1 ORDER BY created_at ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}
