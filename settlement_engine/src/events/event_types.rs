use serde::{Deserialize, Serialize};
use settle_common::Cents;

use crate::db_types::{Order, RefundSource};

/// Emitted once, when a payment webhook moves an order to `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted whenever a refund is applied to an order, from either the refund endpoint or a processor webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefundedEvent {
    /// The order after the refund was applied.
    pub order: Order,
    /// The amount refunded by this refund alone.
    pub amount: Cents,
    pub source: RefundSource,
}

impl OrderRefundedEvent {
    pub fn new(order: Order, amount: Cents, source: RefundSource) -> Self {
        Self { order, amount, source }
    }

    pub fn is_full_refund(&self) -> bool {
        self.order.refunded_amount == self.order.total
    }
}
