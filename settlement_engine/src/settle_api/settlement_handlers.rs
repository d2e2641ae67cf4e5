//! Provider-specific settlement logic. Handlers are always invoked through the [`crate::WebhookProcessor`], so each one
//! runs at most once per event. They still check the order's current state before changing anything, and report a
//! no-op rather than forcing a state the order cannot reach.
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, RefundSource},
    order_objects::{OrderChange, RefundAmount, RefundApplication},
    traits::{OrderManagement, SettlementDatabase},
    webhook_events::{
        is_carrier_cancellation,
        map_delivery_status,
        DeliveryEvent,
        DeliveryWebhook,
        PaymentEvent,
        PaymentReference,
    },
    OrderFlowApi,
    OrderFlowError,
};

pub const PAYMENT_WEBHOOK_ACTOR: &str = "payment_webhook";
pub const DELIVERY_WEBHOOK_ACTOR: &str = "delivery_webhook";

/// The result of a settlement handler. This is what the ledger caches and what a replay returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// The order was changed. Carries the order as written.
    Applied { order: Order },
    /// The event was understood, but the order did not need to (or could not) change.
    NoOp { order_id: Option<OrderId>, reason: String },
    /// The event type or status is not one the engine acts on.
    Ignored { reason: String },
}

impl SettlementOutcome {
    fn from_change(change: OrderChange) -> Self {
        match change {
            OrderChange::Written { after, .. } => Self::Applied { order: after },
            OrderChange::Unchanged { order, reason } => Self::NoOp { order_id: Some(order.id), reason },
        }
    }

    /// Ordering conflicts and validation failures are benign for webhooks: they are acknowledged as no-ops so that the
    /// provider stops redelivering. Only retryable failures are passed on.
    fn from_error(order_id: &OrderId, error: OrderFlowError) -> Result<Self, OrderFlowError> {
        if error.is_retryable() {
            return Err(error);
        }
        warn!("🔄️ Settlement event for order {order_id} not applied. {error}");
        Ok(Self::NoOp { order_id: Some(order_id.clone()), reason: error.to_string() })
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Applied { order } => {
                format!("Order {} updated ({}/{})", order.id, order.order_status, order.payment_status)
            },
            Self::NoOp { reason, .. } => format!("No change. {reason}"),
            Self::Ignored { reason } => format!("Ignored. {reason}"),
        }
    }
}

//--------------------------------------    PaymentHandler     ---------------------------------------------------------
#[derive(Clone)]
pub struct PaymentHandler<B> {
    orders: OrderFlowApi<B>,
}

impl<B> PaymentHandler<B>
where B: SettlementDatabase
{
    pub fn new(orders: OrderFlowApi<B>) -> Self {
        Self { orders }
    }

    /// Finds the order by payment intent id, falling back to the order id carried in the payment metadata.
    pub async fn find_order(&self, reference: &PaymentReference) -> Result<Option<Order>, OrderFlowError> {
        let db = self.orders.db();
        if let Some(intent) = &reference.payment_intent_id {
            if let Some(order) = db.fetch_order_by_payment_intent(intent).await? {
                return Ok(Some(order));
            }
        }
        match &reference.order_id {
            Some(id) => Ok(db.fetch_order_by_id(&OrderId::from(id.as_str())).await?),
            None => Ok(None),
        }
    }

    pub async fn handle(&self, event: &PaymentEvent) -> Result<SettlementOutcome, OrderFlowError> {
        if let PaymentEvent::Unhandled(event_type) = event {
            return Ok(ignored_payment_event(event_type));
        }
        let reference = event.order_reference().unwrap_or_default();
        let Some(order) = self.find_order(&reference).await? else {
            info!("🔄️ Payment event for {reference:?} does not match any order");
            return Ok(SettlementOutcome::NoOp { order_id: None, reason: "No matching order".to_string() });
        };
        let result = match event {
            PaymentEvent::PaymentSucceeded(data) => {
                let reported = data.amount_received.or(data.amount);
                if let Some(amount) = reported.filter(|a| *a != order.total) {
                    warn!("🔄️💰️ Payment of {amount} for order {} does not match its total of {}", order.id, order.total);
                }
                self.orders.mark_paid(&order.id, &data.payment_intent_id, PAYMENT_WEBHOOK_ACTOR).await
            },
            PaymentEvent::PaymentFailed(data) => {
                let reason = data.failure_message.as_deref().unwrap_or("no reason given");
                info!("🔄️💰️ Payment {} for order {} failed: {reason}", data.payment_intent_id, order.id);
                self.orders.mark_payment_failed(&order.id, PAYMENT_WEBHOOK_ACTOR).await
            },
            PaymentEvent::ChargeRefunded(data) => {
                let amount = match (data.amount_refunded, data.latest_refund_amount) {
                    (Some(total_refunded), _) => RefundAmount::Cumulative(total_refunded),
                    (None, Some(amount)) => RefundAmount::Incremental(amount),
                    (None, None) => RefundAmount::StatusOnly,
                };
                let application =
                    RefundApplication::new(data.latest_refund_id.clone(), amount, RefundSource::Webhook)
                        .with_reason(Some(format!("Charge {} refunded", data.charge_id)));
                self.orders.apply_refund(&order.id, application, PAYMENT_WEBHOOK_ACTOR).await
            },
            PaymentEvent::RefundCreated(data) => {
                if !data.is_settled() {
                    let status = data.status.as_deref().unwrap_or_default();
                    let reason = format!("Refund {} is {status}", data.refund_id);
                    return Ok(SettlementOutcome::NoOp { order_id: Some(order.id), reason });
                }
                let Some(amount) = data.amount else {
                    let reason = format!("Refund {} carries no amount", data.refund_id);
                    return Ok(SettlementOutcome::NoOp { order_id: Some(order.id), reason });
                };
                let application = RefundApplication::new(
                    Some(data.refund_id.clone()),
                    RefundAmount::Incremental(amount),
                    RefundSource::Webhook,
                );
                self.orders.apply_refund(&order.id, application, PAYMENT_WEBHOOK_ACTOR).await
            },
            PaymentEvent::Unhandled(event_type) => return Ok(ignored_payment_event(event_type)),
        };
        match result {
            Ok(change) => Ok(SettlementOutcome::from_change(change)),
            Err(e) => SettlementOutcome::from_error(&order.id, e),
        }
    }
}

fn ignored_payment_event(event_type: &str) -> SettlementOutcome {
    let reason = format!("Payment event type {event_type} is not handled");
    debug!("🔄️ {reason}");
    SettlementOutcome::Ignored { reason }
}

//--------------------------------------    DeliveryHandler    ---------------------------------------------------------
#[derive(Clone)]
pub struct DeliveryHandler<B> {
    orders: OrderFlowApi<B>,
}

impl<B> DeliveryHandler<B>
where B: SettlementDatabase
{
    pub fn new(orders: OrderFlowApi<B>) -> Self {
        Self { orders }
    }

    /// Finds the order by stored delivery id, then by the external id we sent at dispatch (the order id).
    ///
    /// Deliveries booked outside this system may carry an order number as their external id. That is only accepted
    /// when exactly one tenant has an order with that number.
    pub async fn find_order(&self, webhook: &DeliveryWebhook) -> Result<Option<Order>, OrderFlowError> {
        let db = self.orders.db();
        if let Some(delivery_id) = &webhook.delivery_id {
            if let Some(order) = db.fetch_order_by_delivery_id(delivery_id).await? {
                return Ok(Some(order));
            }
        }
        let Some(external_id) = &webhook.external_id else {
            return Ok(None);
        };
        if let Some(order) = db.fetch_order_by_id(&OrderId::from(external_id.as_str())).await? {
            return Ok(Some(order));
        }
        let mut candidates = db.fetch_orders_by_order_number(external_id).await?;
        if candidates.len() > 1 {
            warn!(
                "🚚️ Delivery event {} refers to order number {external_id}, which {} tenants use. Not guessing.",
                webhook.event_id,
                candidates.len()
            );
            return Ok(None);
        }
        Ok(candidates.pop())
    }

    pub async fn handle(&self, webhook: &DeliveryWebhook) -> Result<SettlementOutcome, OrderFlowError> {
        let status = match &webhook.event {
            DeliveryEvent::Unhandled(kind) => {
                let reason = format!("Delivery event type {kind} is not handled");
                debug!("🚚️ {reason}");
                return Ok(SettlementOutcome::Ignored { reason });
            },
            DeliveryEvent::StatusChanged { status } => status,
        };
        let Some(target) = map_delivery_status(status) else {
            if is_carrier_cancellation(status) {
                return self.release_cancelled_delivery(webhook, status).await;
            }
            info!("🚚️ Delivery status '{status}' has no order status equivalent. Ignoring it.");
            return Ok(SettlementOutcome::Ignored { reason: format!("Unmapped delivery status {status}") });
        };
        let Some(order) = self.find_order(webhook).await? else {
            info!("🚚️ Delivery event {} does not match any order", webhook.event_id);
            return Ok(SettlementOutcome::NoOp { order_id: None, reason: "No matching order".to_string() });
        };
        if let (None, Some(delivery_id)) = (&order.delivery_id, &webhook.delivery_id) {
            if let Err(e) = self.orders.set_delivery_reference(&order.id, delivery_id, DELIVERY_WEBHOOK_ACTOR).await {
                return SettlementOutcome::from_error(&order.id, e);
            }
        }
        debug!("🚚️ Delivery for order {} is {status}. Moving the order towards {target}.", order.id);
        match self.orders.advance_order_status(&order.id, target, DELIVERY_WEBHOOK_ACTOR).await {
            Ok(change) => Ok(SettlementOutcome::from_change(change)),
            Err(e) => SettlementOutcome::from_error(&order.id, e),
        }
    }

    /// A carrier cancellation does not cancel the customer's order. The delivery reference is dropped so that staff
    /// can dispatch again or refund.
    async fn release_cancelled_delivery(
        &self,
        webhook: &DeliveryWebhook,
        status: &str,
    ) -> Result<SettlementOutcome, OrderFlowError> {
        let (Some(order), Some(delivery_id)) = (self.find_order(webhook).await?, &webhook.delivery_id) else {
            info!("🚚️ Carrier reported delivery {status} in event {}. No dispatched order matches.", webhook.event_id);
            return Ok(SettlementOutcome::Ignored { reason: format!("Carrier reported delivery {status}") });
        };
        warn!("🚚️ Delivery {delivery_id} for order {} was {status} by the carrier. Re-dispatch needed.", order.id);
        match self.orders.clear_delivery_reference(&order.id, delivery_id, DELIVERY_WEBHOOK_ACTOR).await {
            Ok(change) => Ok(SettlementOutcome::from_change(change)),
            Err(e) => SettlementOutcome::from_error(&order.id, e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::sample_order;

    #[test]
    fn outcomes_are_tagged() {
        let outcome = SettlementOutcome::Ignored { reason: "customer.created".into() };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "ignored");
        let noop = SettlementOutcome::NoOp { order_id: Some(OrderId::from("ord_1")), reason: "done".into() };
        let json = serde_json::to_string(&noop).unwrap();
        let back: SettlementOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, noop);
        let applied = SettlementOutcome::Applied { order: sample_order() };
        assert!(applied.is_applied());
        assert!(applied.describe().contains("pending/pending"));
    }

    #[test]
    fn only_retryable_errors_escape() {
        let id = OrderId::from("ord_1");
        let benign = OrderFlowError::InvalidTransition { current: "completed".into(), requested: "ready".into() };
        assert!(matches!(SettlementOutcome::from_error(&id, benign), Ok(SettlementOutcome::NoOp { .. })));
        let retryable = OrderFlowError::DatabaseError("locked".into());
        assert!(SettlementOutcome::from_error(&id, retryable).is_err());
    }
}
