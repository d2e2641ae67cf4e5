use thiserror::Error;

use crate::{
    db_types::{AuditLogEntry, NewOrder, Order, OrderId, RefundRecord},
    traits::VersionedUpdate,
};

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot insert order, since order number {0} already exists for this tenant")]
    OrderAlreadyExists(String),
    #[error("Order {0} was modified by someone else since it was read")]
    StaleVersion(OrderId),
    #[error("Refund {0} has already been recorded")]
    DuplicateRefund(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

/// The order store.
///
/// Orders are never deleted. All mutations go through [`OrderManagement::update_order_versioned`], which only writes
/// if nobody else has written since the caller read the order.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order as pending and unpaid, at version 1. Fails with `OrderAlreadyExists` if the tenant already has
    /// an order with the same order number.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError>;

    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    /// Fetches every order carrying the given human-readable order number. Order numbers are only unique per tenant,
    /// so there may be more than one.
    async fn fetch_orders_by_order_number(&self, order_number: &str) -> Result<Vec<Order>, OrderStoreError>;

    async fn fetch_order_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, OrderStoreError>;

    async fn fetch_order_by_delivery_id(&self, delivery_id: &str) -> Result<Option<Order>, OrderStoreError>;

    /// Writes the update if the stored version matches. Returns the stored order, with its version bumped.
    ///
    /// Fails with `StaleVersion` if the order changed in the meantime, `OrderNotFound` if it does not exist, and
    /// `DuplicateRefund` if the attached refund id has been recorded before. Nothing is written in any failure case.
    async fn update_order_versioned(&self, update: VersionedUpdate) -> Result<Order, OrderStoreError>;

    async fn refund_exists(&self, refund_id: &str) -> Result<bool, OrderStoreError>;

    async fn fetch_refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<RefundRecord>, OrderStoreError>;

    async fn fetch_audit_log(&self, order_id: &OrderId) -> Result<Vec<AuditLogEntry>, OrderStoreError>;
}
