use log::*;
use provider_clients::{NewStripeRefund, ProviderError, StripeApi, StripeConfig};
use settle_common::Cents;
use settlement_engine::traits::{
    CaptureStatus,
    ExternalServiceError,
    PaymentProcessor,
    ProcessorRefund,
    RefundRequest,
};

use super::external_error;

#[derive(Debug, Clone)]
pub struct StripeProcessor {
    api: StripeApi,
}

impl StripeProcessor {
    pub fn new(config: StripeConfig) -> Result<Self, ProviderError> {
        let api = StripeApi::new(config)?;
        Ok(Self { api })
    }
}

impl PaymentProcessor for StripeProcessor {
    async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, ExternalServiceError> {
        let refund = NewStripeRefund {
            payment_intent: request.payment_intent_id,
            amount: request.amount.value(),
            order_id: request.order_id.to_string(),
            reason: request.reason,
            idempotency_key: request.idempotency_key,
        };
        let result = self.api.create_refund(&refund).await.map_err(|e| {
            warn!("💸️ Refund for order {} was not created. {e}", refund.order_id);
            external_error("stripe", e)
        })?;
        Ok(ProcessorRefund {
            refund_id: result.id,
            amount: Cents::from(result.amount),
            status: result.status.unwrap_or_else(|| "pending".to_string()),
        })
    }

    async fn fetch_payment_status(&self, payment_intent_id: &str) -> Result<CaptureStatus, ExternalServiceError> {
        let intent = self.api.fetch_payment_intent(payment_intent_id).await.map_err(|e| external_error("stripe", e))?;
        Ok(CaptureStatus {
            payment_intent_id: intent.id,
            status: intent.status,
            amount: Cents::from(intent.amount),
            amount_received: Cents::from(intent.amount_received),
            currency: intent.currency.to_uppercase(),
        })
    }
}
