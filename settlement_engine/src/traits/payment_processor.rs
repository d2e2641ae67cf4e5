use serde::{Deserialize, Serialize};
use settle_common::Cents;
use thiserror::Error;

use crate::db_types::OrderId;

/// A failure reported by (or while talking to) an external service.
///
/// Timeouts, 5xx responses and network failures are retryable. Rejections of the request itself are not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExternalServiceError {
    pub retryable: bool,
    pub message: String,
}

impl ExternalServiceError {
    pub fn retryable<S: Into<String>>(message: S) -> Self {
        Self { retryable: true, message: message.into() }
    }

    pub fn permanent<S: Into<String>>(message: S) -> Self {
        Self { retryable: false, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub order_id: OrderId,
    pub payment_intent_id: String,
    pub amount: Cents,
    /// Sent to the processor so that a retried call cannot refund twice.
    pub idempotency_key: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRefund {
    pub refund_id: String,
    pub amount: Cents,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub payment_intent_id: String,
    pub status: String,
    pub amount: Cents,
    pub amount_received: Cents,
    pub currency: String,
}

/// The card payment processor. It is the source of truth for money movement: local refund bookkeeping only changes
/// after [`PaymentProcessor::create_refund`] succeeds.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor: Clone {
    async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, ExternalServiceError>;

    async fn fetch_payment_status(&self, payment_intent_id: &str) -> Result<CaptureStatus, ExternalServiceError>;
}
