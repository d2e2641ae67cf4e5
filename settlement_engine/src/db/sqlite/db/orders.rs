use chrono::Utc;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId},
    traits::{OrderStoreError, VersionedUpdate},
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// Returns `OrderAlreadyExists` if the tenant already has an order with this order number.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderStoreError> {
    let order_number = order.order_number.clone();
    let b = order.breakdown;
    let inserted: Option<Order> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                tenant_id,
                order_number,
                order_type,
                currency,
                tax_rate,
                subtotal,
                tax,
                delivery_fee,
                merchant_fee,
                tip,
                discount,
                processor_fee,
                total,
                payment_intent_id,
                customer_name,
                customer_phone,
                delivery_address,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $19)
            ON CONFLICT (tenant_id, order_number) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(order.tenant_id)
    .bind(order.order_number)
    .bind(order.order_type)
    .bind(order.currency)
    .bind(order.tax_rate)
    .bind(b.subtotal)
    .bind(b.tax)
    .bind(b.delivery_fee)
    .bind(b.merchant_fee)
    .bind(b.tip)
    .bind(b.discount)
    .bind(b.processor_fee)
    .bind(b.total)
    .bind(order.payment_intent_id)
    .bind(order.customer_name)
    .bind(order.customer_phone)
    .bind(order.delivery_address)
    .bind(order.created_at)
    .fetch_optional(conn)
    .await?;
    let order = inserted.ok_or(OrderStoreError::OrderAlreadyExists(order_number))?;
    debug!("🗃️ Order {} [{}] inserted for tenant {}", order.id, order.order_number, order.tenant_id);
    Ok(order)
}

pub async fn fetch_order_by_id(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

/// Every order with the given order number, across all tenants, newest first.
pub async fn fetch_orders_by_order_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_number = $1 ORDER BY created_at DESC")
        .bind(order_number)
        .fetch_all(conn)
        .await
}

pub async fn fetch_order_by_payment_intent(
    payment_intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE payment_intent_id = $1 ORDER BY created_at DESC LIMIT 1")
        .bind(payment_intent_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_order_by_delivery_id(
    delivery_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE delivery_id = $1 ORDER BY created_at DESC LIMIT 1")
        .bind(delivery_id)
        .fetch_optional(conn)
        .await
}

/// Writes every mutable field of the order, but only if the stored version is still `expected_version`. The version is
/// bumped in the same statement.
///
/// Returns `None` if no row matched, i.e. the order does not exist or somebody else wrote it first.
pub async fn update_order_versioned(
    update: &VersionedUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let o = &update.order;
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                subtotal = $1,
                tax = $2,
                delivery_fee = $3,
                merchant_fee = $4,
                tip = $5,
                discount = $6,
                processor_fee = $7,
                total = $8,
                refunded_amount = $9,
                order_status = $10,
                payment_status = $11,
                payment_intent_id = $12,
                delivery_id = $13,
                completed_at = $14,
                refunded_at = $15,
                updated_at = $16,
                version = version + 1
            WHERE id = $17 AND version = $18
            RETURNING *;
        "#,
    )
    .bind(o.subtotal)
    .bind(o.tax)
    .bind(o.delivery_fee)
    .bind(o.merchant_fee)
    .bind(o.tip)
    .bind(o.discount)
    .bind(o.processor_fee)
    .bind(o.total)
    .bind(o.refunded_amount)
    .bind(o.order_status)
    .bind(o.payment_status)
    .bind(o.payment_intent_id.as_deref())
    .bind(o.delivery_id.as_deref())
    .bind(o.completed_at)
    .bind(o.refunded_at)
    .bind(Utc::now())
    .bind(o.id.as_str())
    .bind(update.expected_version)
    .fetch_optional(conn)
    .await?;
    match &order {
        Some(o) => trace!("🗃️ Order {} written at version {}", o.id, o.version),
        None => trace!("🗃️ Versioned write of order {} at version {} matched no rows", o.id, update.expected_version),
    }
    Ok(order)
}
