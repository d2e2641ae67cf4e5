//! Provider webhook payloads, decoded once at the boundary into strongly typed events.
//!
//! Unknown event types are not errors. They decode to an `Unhandled` variant, which is acknowledged and recorded but
//! otherwise ignored, so that new provider event types never trigger a redelivery storm.
use std::collections::HashMap;

use serde::Deserialize;
use settle_common::Cents;

use crate::{
    db_types::{EventKey, OrderStatusType},
    WebhookError,
};

pub const PAYMENT_PROVIDER: &str = "stripe";
pub const DELIVERY_PROVIDER: &str = "uber";

//--------------------------------------    Payment events     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentWebhook {
    pub event_id: String,
    pub event_type: String,
    pub event: PaymentEvent,
}

impl PaymentWebhook {
    pub fn key(&self) -> EventKey {
        EventKey::new(PAYMENT_PROVIDER, self.event_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    PaymentSucceeded(PaymentIntentData),
    PaymentFailed(PaymentIntentData),
    /// A charge-level refund notification. Carries the running refunded total.
    ChargeRefunded(ChargeRefundData),
    /// A single refund object was created.
    RefundCreated(RefundData),
    Unhandled(String),
}

impl PaymentEvent {
    /// The references used to find the order an event is about.
    pub fn order_reference(&self) -> Option<PaymentReference> {
        match self {
            Self::PaymentSucceeded(d) | Self::PaymentFailed(d) => {
                Some(PaymentReference { payment_intent_id: Some(d.payment_intent_id.clone()), order_id: d.order_id.clone() })
            },
            Self::ChargeRefunded(d) => {
                Some(PaymentReference { payment_intent_id: d.payment_intent_id.clone(), order_id: d.order_id.clone() })
            },
            Self::RefundCreated(d) => {
                Some(PaymentReference { payment_intent_id: d.payment_intent_id.clone(), order_id: d.order_id.clone() })
            },
            Self::Unhandled(_) => None,
        }
    }
}

/// An order is found by payment intent id first, falling back to the order id in the payment metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentReference {
    pub payment_intent_id: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentData {
    pub payment_intent_id: String,
    pub amount: Option<Cents>,
    pub amount_received: Option<Cents>,
    pub currency: Option<String>,
    pub order_id: Option<String>,
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRefundData {
    pub charge_id: String,
    pub payment_intent_id: Option<String>,
    pub order_id: Option<String>,
    /// Everything refunded on this charge so far.
    pub amount_refunded: Option<Cents>,
    pub latest_refund_id: Option<String>,
    pub latest_refund_amount: Option<Cents>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundData {
    pub refund_id: String,
    pub payment_intent_id: Option<String>,
    pub order_id: Option<String>,
    pub amount: Option<Cents>,
    pub status: Option<String>,
}

impl RefundData {
    /// Refund objects are created as pending for some payment methods. Only successful refunds move money.
    pub fn is_settled(&self) -> bool {
        self.status.as_deref().map(|s| s == "succeeded").unwrap_or(true)
    }
}

#[derive(Deserialize)]
struct RawPaymentEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawPaymentEventData,
}

#[derive(Deserialize)]
struct RawPaymentEventData {
    object: serde_json::Value,
}

#[derive(Deserialize)]
struct RawPaymentIntent {
    id: String,
    amount: Option<Cents>,
    amount_received: Option<Cents>,
    currency: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    last_payment_error: Option<RawPaymentError>,
}

#[derive(Deserialize)]
struct RawPaymentError {
    message: Option<String>,
}

#[derive(Deserialize)]
struct RawCharge {
    id: String,
    payment_intent: Option<String>,
    amount_refunded: Option<Cents>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    refunds: Option<RawRefundList>,
}

#[derive(Deserialize)]
struct RawRefundList {
    #[serde(default)]
    data: Vec<RawRefund>,
}

#[derive(Deserialize)]
struct RawRefund {
    id: String,
    amount: Option<Cents>,
    payment_intent: Option<String>,
    status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn malformed<E: std::fmt::Display>(e: E) -> WebhookError {
    WebhookError::MalformedPayload(e.to_string())
}

pub fn decode_payment_event(body: &[u8]) -> Result<PaymentWebhook, WebhookError> {
    let raw: RawPaymentEvent = serde_json::from_slice(body).map_err(malformed)?;
    let object = raw.data.object;
    let event = match raw.event_type.as_str() {
        "payment_intent.succeeded" => PaymentEvent::PaymentSucceeded(payment_intent(object)?),
        "payment_intent.payment_failed" => PaymentEvent::PaymentFailed(payment_intent(object)?),
        "charge.refunded" => {
            let charge: RawCharge = serde_json::from_value(object).map_err(malformed)?;
            // The most recent refund is listed first.
            let latest = charge.refunds.and_then(|r| r.data.into_iter().next());
            PaymentEvent::ChargeRefunded(ChargeRefundData {
                charge_id: charge.id,
                payment_intent_id: charge.payment_intent,
                order_id: charge.metadata.get("order_id").cloned(),
                amount_refunded: charge.amount_refunded,
                latest_refund_amount: latest.as_ref().and_then(|r| r.amount),
                latest_refund_id: latest.map(|r| r.id),
            })
        },
        "refund.created" => {
            let refund: RawRefund = serde_json::from_value(object).map_err(malformed)?;
            PaymentEvent::RefundCreated(RefundData {
                order_id: refund.metadata.get("order_id").cloned(),
                refund_id: refund.id,
                payment_intent_id: refund.payment_intent,
                amount: refund.amount,
                status: refund.status,
            })
        },
        other => PaymentEvent::Unhandled(other.to_string()),
    };
    Ok(PaymentWebhook { event_id: raw.id, event_type: raw.event_type, event })
}

fn payment_intent(object: serde_json::Value) -> Result<PaymentIntentData, WebhookError> {
    let intent: RawPaymentIntent = serde_json::from_value(object).map_err(malformed)?;
    Ok(PaymentIntentData {
        order_id: intent.metadata.get("order_id").cloned(),
        payment_intent_id: intent.id,
        amount: intent.amount,
        amount_received: intent.amount_received,
        currency: intent.currency,
        failure_message: intent.last_payment_error.and_then(|e| e.message),
    })
}

//--------------------------------------    Delivery events    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryWebhook {
    pub event_id: String,
    pub event_type: String,
    /// The provider's delivery id, if the event carries one.
    pub delivery_id: Option<String>,
    /// Our order number, echoed back by the provider.
    pub external_id: Option<String>,
    pub event: DeliveryEvent,
}

impl DeliveryWebhook {
    pub fn key(&self) -> EventKey {
        EventKey::new(DELIVERY_PROVIDER, self.event_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    StatusChanged { status: String },
    Unhandled(String),
}

/// Maps the delivery provider's status vocabulary onto order statuses. Unknown statuses map to `None`.
///
/// Carrier cancellations also map to `None`. The customer's order is still paid for and may be re-dispatched or
/// refunded, which is a staff decision.
pub fn map_delivery_status(status: &str) -> Option<OrderStatusType> {
    match status.to_ascii_lowercase().as_str() {
        "courier_assigned" | "pickup" | "en_route_to_pickup" | "arrived_at_pickup" => Some(OrderStatusType::Preparing),
        "picked_up" | "pickup_complete" | "dropoff" | "en_route_to_dropoff" | "arrived_at_dropoff" => {
            Some(OrderStatusType::Ready)
        },
        "delivered" | "dropoff_complete" => Some(OrderStatusType::Completed),
        _ => None,
    }
}

pub fn is_carrier_cancellation(status: &str) -> bool {
    matches!(status.to_ascii_lowercase().as_str(), "canceled" | "cancelled" | "returned")
}

#[derive(Deserialize)]
struct RawDeliveryEvent {
    id: Option<String>,
    kind: String,
    delivery_id: Option<String>,
    status: Option<String>,
    external_id: Option<String>,
    data: Option<RawDelivery>,
}

#[derive(Deserialize)]
struct RawDelivery {
    id: Option<String>,
    status: Option<String>,
    external_id: Option<String>,
}

pub fn decode_delivery_event(body: &[u8]) -> Result<DeliveryWebhook, WebhookError> {
    let raw: RawDeliveryEvent = serde_json::from_slice(body).map_err(malformed)?;
    let data = raw.data.unwrap_or(RawDelivery { id: None, status: None, external_id: None });
    let delivery_id = raw.delivery_id.or(data.id);
    let external_id = raw.external_id.or(data.external_id);
    let status = raw.status.or(data.status);
    let event = match (raw.kind.as_str(), &status) {
        ("event.delivery_status", Some(status)) => DeliveryEvent::StatusChanged { status: status.clone() },
        ("event.delivery_status", None) => {
            return Err(WebhookError::MalformedPayload("Delivery status event without a status".into()));
        },
        (other, _) => DeliveryEvent::Unhandled(other.to_string()),
    };
    // Events without an id are keyed on what they say, so a replay of the same status is still recognised.
    let event_id = match raw.id {
        Some(id) => id,
        None => format!(
            "{}:{}:{}",
            delivery_id.as_deref().or(external_id.as_deref()).unwrap_or("unknown"),
            raw.kind,
            status.as_deref().unwrap_or("none")
        ),
    };
    Ok(DeliveryWebhook { event_id, event_type: raw.kind, delivery_id, external_id, event })
}
