use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{IdempotencyRecord, VerificationStatus},
    helpers::{SecretLookup, Verification, VerificationReason, WebhookHeaders},
    traits::{EventClaim, IdempotencyLedger, SettlementDatabase, TenantManagement},
    webhook_events::{decode_delivery_event, decode_payment_event},
    DeliveryHandler,
    LedgerConfig,
    OrderFlowApi,
    PaymentHandler,
    SettlementOutcome,
    WebhookError,
    WebhookProcessor,
    WebhookSecurityConfig,
};

/// What a webhook endpoint tells the provider once an event has been durably recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub event_id: String,
    pub already_processed: bool,
    pub verification: VerificationReason,
    pub outcome: SettlementOutcome,
}

impl WebhookAck {
    pub fn message(&self) -> String {
        let replay = if self.already_processed { " (replay)" } else { "" };
        format!("Event {}{replay}: {}", self.event_id, self.outcome.describe())
    }
}

/// The webhook entry point: authenticate, decode, then hand the event to its settlement handler through the
/// process-once wrapper.
#[derive(Clone)]
pub struct WebhookApi<B> {
    db: B,
    processor: WebhookProcessor<B>,
    security: WebhookSecurityConfig,
    payments: PaymentHandler<B>,
    deliveries: DeliveryHandler<B>,
}

impl<B> Debug for WebhookApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B> WebhookApi<B>
where B: SettlementDatabase
{
    pub fn new(orders: OrderFlowApi<B>, security: WebhookSecurityConfig, ledger: LedgerConfig) -> Self {
        let db = orders.db().clone();
        Self {
            processor: WebhookProcessor::new(db.clone(), ledger),
            db,
            security,
            payments: PaymentHandler::new(orders.clone()),
            deliveries: DeliveryHandler::new(orders),
        }
    }

    pub fn processor(&self) -> &WebhookProcessor<B> {
        &self.processor
    }

    /// Payment processor events are signed with the platform secret, so the signature is checked before the body is
    /// even decoded.
    pub async fn handle_payment_webhook(
        &self,
        body: &[u8],
        headers: &WebhookHeaders,
    ) -> Result<WebhookAck, WebhookError> {
        let verification = self.security.payment_verifier().verify(body, headers, &self.security.payment_secret());
        if !verification.valid {
            return Err(WebhookError::Unauthorized(verification.reason));
        }
        let webhook = decode_payment_event(body)?;
        let tenant_id = match webhook.event.order_reference() {
            Some(reference) => self.payments.find_order(&reference).await?.map(|o| o.tenant_id),
            None => None,
        };
        log_unverified(&verification, &webhook.event_id, tenant_id.as_deref());
        let claim = EventClaim::new(webhook.key(), webhook.event_type.clone())
            .with_tenant(tenant_id)
            .with_verification(audit_status(&verification));
        let result = self.processor.process_once(claim, || self.payments.handle(&webhook.event)).await?;
        let ack = WebhookAck {
            event_id: webhook.event_id,
            already_processed: result.already_processed,
            verification: verification.reason,
            outcome: result.result,
        };
        debug!("📥️ Payment webhook acknowledged. {}", ack.message());
        Ok(ack)
    }

    /// Delivery provider events are signed with a per-tenant secret. The tenant is only known once the order the event
    /// refers to has been found, so the body is decoded first. An event about an order that does not exist is
    /// rejected.
    pub async fn handle_delivery_webhook(
        &self,
        body: &[u8],
        headers: &WebhookHeaders,
    ) -> Result<WebhookAck, WebhookError> {
        let webhook = decode_delivery_event(body)?;
        let order = self.deliveries.find_order(&webhook).await?;
        let secret = match &order {
            Some(order) => {
                let tenant = self.db.fetch_tenant(&order.tenant_id).await?;
                SecretLookup::from_option(tenant.and_then(|t| t.delivery_webhook_secret))
            },
            None => SecretLookup::OrderNotFound,
        };
        let verification = self.security.delivery_verifier().verify(body, headers, &secret);
        if !verification.valid {
            return Err(WebhookError::Unauthorized(verification.reason));
        }
        let tenant_id = order.map(|o| o.tenant_id);
        log_unverified(&verification, &webhook.event_id, tenant_id.as_deref());
        let claim = EventClaim::new(webhook.key(), webhook.event_type.clone())
            .with_tenant(tenant_id)
            .with_verification(audit_status(&verification));
        let result = self.processor.process_once(claim, || self.deliveries.handle(&webhook)).await?;
        let ack = WebhookAck {
            event_id: webhook.event_id,
            already_processed: result.already_processed,
            verification: verification.reason,
            outcome: result.result,
        };
        debug!("📥️ Delivery webhook acknowledged. {}", ack.message());
        Ok(ack)
    }

    /// The tenant-visible audit of events that were processed without a verified signature.
    pub async fn unverified_events(&self, tenant_id: &str) -> Result<Vec<IdempotencyRecord>, WebhookError> {
        Ok(self.db.fetch_unverified_events(tenant_id).await?)
    }
}

fn audit_status(verification: &Verification) -> VerificationStatus {
    verification.audit_status().unwrap_or(VerificationStatus::Verified)
}

fn log_unverified(verification: &Verification, event_id: &str, tenant_id: Option<&str>) {
    if verification.is_unverified() {
        warn!(
            "📥️ UNVERIFIED event {event_id} for tenant {} is being processed ({}). It is recorded in the tenant's \
             unverified events audit.",
            tenant_id.unwrap_or("unknown"),
            verification.reason
        );
    }
}
