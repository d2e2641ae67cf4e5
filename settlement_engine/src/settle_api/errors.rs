use settle_common::Cents;
use thiserror::Error;

use crate::{
    db_types::{EventKey, OrderId, PaymentStatusType},
    fees::FeeError,
    helpers::VerificationReason,
    state_machine::TransitionError,
    traits::{ExternalServiceError, LedgerError, OrderStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot change status from {current} to {requested}")]
    InvalidTransition { current: String, requested: String },
    #[error("Order {0} kept changing while we tried to update it. Try again.")]
    ConcurrentModification(OrderId),
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("Order number {0} already exists for this tenant")]
    OrderAlreadyExists(String),
    #[error("There is nothing left to refund on order {0}")]
    NothingToRefund(OrderId),
    #[error("A refund of {requested} exceeds the refundable balance of {max}")]
    RefundExceedsBalance { requested: Cents, max: Cents },
    #[error("Refund {0} has already been applied")]
    DuplicateRefund(String),
    #[error("Discounts can only be applied before payment. The payment status is {0}")]
    DiscountNotAllowed(PaymentStatusType),
    #[error("External service error: {message}")]
    ExternalServiceError { retryable: bool, message: String },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    /// True for failures of a dependency (database, processor, provider, or a lost race) where trying the same request
    /// again later can succeed. Validation failures and ordering conflicts are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConcurrentModification(_) | Self::DatabaseError(_) => true,
            Self::ExternalServiceError { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl From<OrderStoreError> for OrderFlowError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::DatabaseError(s) => Self::DatabaseError(s),
            OrderStoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            OrderStoreError::OrderAlreadyExists(n) => Self::OrderAlreadyExists(n),
            OrderStoreError::StaleVersion(id) => Self::ConcurrentModification(id),
            OrderStoreError::DuplicateRefund(id) => Self::DuplicateRefund(id),
        }
    }
}

impl From<LedgerError> for OrderFlowError {
    fn from(e: LedgerError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<FeeError> for OrderFlowError {
    fn from(e: FeeError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<TransitionError> for OrderFlowError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::Empty => Self::Validation(e.to_string()),
            _ => Self::InvalidTransition { current: e.current(), requested: e.requested() },
        }
    }
}

impl From<ExternalServiceError> for OrderFlowError {
    fn from(e: ExternalServiceError) -> Self {
        Self::ExternalServiceError { retryable: e.retryable, message: e.message }
    }
}

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("Webhook rejected: {0}")]
    Unauthorized(VerificationReason),
    #[error("Could not decode webhook payload. {0}")]
    MalformedPayload(String),
    #[error("Event {0} is still being processed by another worker")]
    EventInFlight(EventKey),
    #[error("Webhook handler failed. {0}")]
    HandlerFailed(String),
    #[error("Idempotency ledger error. {0}")]
    Ledger(#[from] LedgerError),
}

impl WebhookError {
    /// Retryable failures are answered with a non-2xx status so that the provider redelivers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EventInFlight(_) | Self::HandlerFailed(_) | Self::Ledger(_))
    }
}

impl From<OrderStoreError> for WebhookError {
    fn from(e: OrderStoreError) -> Self {
        Self::HandlerFailed(e.to_string())
    }
}

impl From<OrderFlowError> for WebhookError {
    fn from(e: OrderFlowError) -> Self {
        Self::HandlerFailed(e.to_string())
    }
}
