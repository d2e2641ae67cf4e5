use serde::{Deserialize, Serialize};

use crate::db_types::{
    EventKey,
    IdempotencyRecord,
    NewRefund,
    Order,
    OrderStatusType,
    PaymentStatusType,
    VerificationStatus,
};

/// A complete replacement of an order's mutable fields, guarded by the version the caller read.
///
/// The backend writes `order` only if the stored version still equals `expected_version`, bumping the version in the
/// same statement. If a refund is attached it is recorded in the same transaction, and a duplicate refund id rolls the
/// whole update back. A status change appends an audit log entry.
#[derive(Debug, Clone)]
pub struct VersionedUpdate {
    pub expected_version: i64,
    pub order: Order,
    pub actor: String,
    pub previous_order_status: OrderStatusType,
    pub previous_payment_status: PaymentStatusType,
    pub refund: Option<NewRefund>,
}

impl VersionedUpdate {
    pub fn new<S: Into<String>>(current: &Order, updated: Order, actor: S) -> Self {
        Self {
            expected_version: current.version,
            order: updated,
            actor: actor.into(),
            previous_order_status: current.order_status,
            previous_payment_status: current.payment_status,
            refund: None,
        }
    }

    pub fn with_refund(mut self, refund: NewRefund) -> Self {
        self.refund = Some(refund);
        self
    }

    pub fn status_changed(&self) -> bool {
        self.previous_order_status != self.order.order_status ||
            self.previous_payment_status != self.order.payment_status
    }
}

/// The placeholder written to the ledger when an event is first seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventClaim {
    pub key: EventKey,
    pub event_type: String,
    pub tenant_id: Option<String>,
    pub verification: VerificationStatus,
}

impl EventClaim {
    pub fn new<S: Into<String>>(key: EventKey, event_type: S) -> Self {
        Self { key, event_type: event_type.into(), tenant_id: None, verification: VerificationStatus::Verified }
    }

    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_verification(mut self, verification: VerificationStatus) -> Self {
        self.verification = verification;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller inserted the in-flight placeholder and owns the event.
    Claimed(IdempotencyRecord),
    /// A record for the event already exists.
    Existing(IdempotencyRecord),
}
