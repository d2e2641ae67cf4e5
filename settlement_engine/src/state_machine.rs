//! Order and payment status transition rules.
//!
//! | order status | may move to                                |
//! |--------------|--------------------------------------------|
//! | pending      | confirmed, cancelled                       |
//! | confirmed    | preparing, ready, completed, cancelled     |
//! | preparing    | ready, completed, cancelled                |
//! | ready        | completed, cancelled                       |
//! | completed    | -                                          |
//! | cancelled    | -                                          |
//!
//! | payment status | may move to                  |
//! |----------------|------------------------------|
//! | pending        | paid, failed                 |
//! | paid           | partial_refund, refunded     |
//! | partial_refund | partial_refund, refunded     |
//! | failed         | -                            |
//! | refunded       | -                            |
//!
//! Anything not listed is an invalid transition, including self-transitions. `partial_refund` is the one state that
//! may be re-entered, since every further partial refund lands there again.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Order, OrderStatusType, PaymentStatusType};

impl OrderStatusType {
    pub fn allowed_targets(&self) -> &'static [OrderStatusType] {
        use OrderStatusType::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Preparing, Ready, Completed, Cancelled],
            Preparing => &[Ready, Completed, Cancelled],
            Ready => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatusType) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }
}

impl PaymentStatusType {
    pub fn allowed_targets(&self) -> &'static [PaymentStatusType] {
        use PaymentStatusType::*;
        match self {
            Pending => &[Paid, Failed],
            Paid | PartialRefund => &[PartialRefund, Refunded],
            Failed | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, target: PaymentStatusType) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Refunds are only possible once money has actually been captured.
    pub fn is_refundable(&self) -> bool {
        matches!(self, PaymentStatusType::Paid | PaymentStatusType::PartialRefund)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot change order status from {current} to {requested}")]
    OrderStatus { current: OrderStatusType, requested: OrderStatusType },
    #[error("Cannot change payment status from {current} to {requested}")]
    PaymentStatus { current: PaymentStatusType, requested: PaymentStatusType },
    #[error("A status change must request a new order status, a new payment status, or both")]
    Empty,
}

impl TransitionError {
    pub fn current(&self) -> String {
        match self {
            Self::OrderStatus { current, .. } => current.to_string(),
            Self::PaymentStatus { current, .. } => current.to_string(),
            Self::Empty => String::default(),
        }
    }

    pub fn requested(&self) -> String {
        match self {
            Self::OrderStatus { requested, .. } => requested.to_string(),
            Self::PaymentStatus { requested, .. } => requested.to_string(),
            Self::Empty => String::default(),
        }
    }
}

/// A requested change to one or both of an order's status fields. Both changes are validated and written together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub order_status: Option<OrderStatusType>,
    pub payment_status: Option<PaymentStatusType>,
}

impl StatusChange {
    pub fn order(status: OrderStatusType) -> Self {
        Self { order_status: Some(status), payment_status: None }
    }

    pub fn payment(status: PaymentStatusType) -> Self {
        Self { order_status: None, payment_status: Some(status) }
    }

    pub fn and_order(mut self, status: OrderStatusType) -> Self {
        self.order_status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_status.is_none() && self.payment_status.is_none()
    }

    pub fn validate_for(&self, order: &Order) -> Result<(), TransitionError> {
        if self.is_empty() {
            return Err(TransitionError::Empty);
        }
        if let Some(requested) = self.order_status {
            if !order.order_status.can_transition_to(requested) {
                return Err(TransitionError::OrderStatus { current: order.order_status, requested });
            }
        }
        if let Some(requested) = self.payment_status {
            if !order.payment_status.can_transition_to(requested) {
                return Err(TransitionError::PaymentStatus { current: order.payment_status, requested });
            }
        }
        Ok(())
    }

    /// Writes the change into `order`, stamping `completed_at` if the order has just completed. The change must have
    /// been validated first.
    pub fn apply_to(&self, order: &mut Order, now: DateTime<Utc>) {
        if let Some(status) = self.order_status {
            order.order_status = status;
            if status == OrderStatusType::Completed {
                order.completed_at = Some(now);
            }
        }
        if let Some(status) = self.payment_status {
            order.payment_status = status;
        }
    }
}
