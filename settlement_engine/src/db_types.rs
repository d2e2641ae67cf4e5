use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
pub use settle_common::{Cents, Rate};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::fees::FeeBreakdown;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh, unique order id.
    pub fn random() -> Self {
        Self(format!("ord_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Implements `Display` and `FromStr` for a C-like enum using its snake_case storage names.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("'{s}' is not a valid {}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------       OrderType       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// The customer collects the order. No delivery or merchant fees apply.
    Pickup,
    /// The order is handed to a delivery provider.
    Delivery,
}

string_enum!(OrderType { Pickup => "pickup", Delivery => "delivery" });

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The fulfilment status of an order. See [`crate::state_machine`] for the allowed transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been placed but payment has not been captured yet.
    Pending,
    /// Payment was captured (or staff accepted the order).
    Confirmed,
    /// The kitchen is working on the order, or a courier has been assigned.
    Preparing,
    /// Ready for collection, or in the hands of the courier.
    Ready,
    /// Handed over to the customer. Terminal.
    Completed,
    /// Terminal.
    Cancelled,
}

string_enum!(OrderStatusType {
    Pending => "pending",
    Confirmed => "confirmed",
    Preparing => "preparing",
    Ready => "ready",
    Completed => "completed",
    Cancelled => "cancelled",
});

//--------------------------------------  PaymentStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatusType {
    Pending,
    Paid,
    Failed,
    PartialRefund,
    Refunded,
}

string_enum!(PaymentStatusType {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    PartialRefund => "partial_refund",
    Refunded => "refunded",
});

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub tenant_id: String,
    pub order_number: String,
    pub order_type: OrderType,
    pub currency: String,
    pub tax_rate: Rate,
    pub subtotal: Cents,
    pub tax: Cents,
    pub delivery_fee: Cents,
    pub merchant_fee: Cents,
    pub tip: Cents,
    pub discount: Cents,
    pub processor_fee: Cents,
    pub total: Cents,
    pub refunded_amount: Cents,
    pub order_status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    pub payment_intent_id: Option<String>,
    pub delivery_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn breakdown(&self) -> FeeBreakdown {
        FeeBreakdown {
            subtotal: self.subtotal,
            tax: self.tax,
            delivery_fee: self.delivery_fee,
            merchant_fee: self.merchant_fee,
            tip: self.tip,
            discount: self.discount,
            processor_fee: self.processor_fee,
            total: self.total,
        }
    }

    /// Overwrites the financial fields with the given breakdown. The refunded amount is left untouched.
    pub fn set_breakdown(&mut self, breakdown: &FeeBreakdown) {
        self.subtotal = breakdown.subtotal;
        self.tax = breakdown.tax;
        self.delivery_fee = breakdown.delivery_fee;
        self.merchant_fee = breakdown.merchant_fee;
        self.tip = breakdown.tip;
        self.discount = breakdown.discount;
        self.processor_fee = breakdown.processor_fee;
        self.total = breakdown.total;
    }

    /// The amount that can still be refunded, `total - refunded_amount`.
    pub fn max_refundable(&self) -> Cents {
        self.total - self.refunded_amount
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order {} ({}, tenant {}): {} total {} refunded {} [{}/{}]",
            self.id,
            self.order_number,
            self.tenant_id,
            self.order_type,
            self.total,
            self.refunded_amount,
            self.order_status,
            self.payment_status
        )
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
/// A fully priced order, ready to be stored. Use [`crate::OrderFlowApi::create_order`] to build one from a request.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub tenant_id: String,
    pub order_number: String,
    pub order_type: OrderType,
    pub currency: String,
    pub tax_rate: Rate,
    pub breakdown: FeeBreakdown,
    pub payment_intent_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Tenant         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub name: String,
    /// The flat platform fee added to delivery orders.
    pub merchant_fee: Cents,
    pub tax_rate: Rate,
    /// HMAC secret used by the delivery provider to sign webhooks for this tenant.
    #[serde(skip_serializing)]
    pub delivery_webhook_secret: Option<String>,
    pub pickup_address: Option<String>,
    pub pickup_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn has_webhook_secret(&self) -> bool {
        self.delivery_webhook_secret.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTenant {
    pub tenant_id: String,
    pub name: String,
    pub merchant_fee: Cents,
    pub tax_rate: Rate,
    pub delivery_webhook_secret: Option<String>,
    pub pickup_address: Option<String>,
    pub pickup_phone: Option<String>,
}

impl NewTenant {
    pub fn new<S: Into<String>>(tenant_id: S, name: S) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: name.into(),
            merchant_fee: Cents::from(100),
            tax_rate: Rate::default(),
            delivery_webhook_secret: None,
            pickup_address: None,
            pickup_phone: None,
        }
    }

    pub fn with_tax_rate(mut self, tax_rate: Rate) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_merchant_fee(mut self, fee: Cents) -> Self {
        self.merchant_fee = fee;
        self
    }

    pub fn with_webhook_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.delivery_webhook_secret = Some(secret.into());
        self
    }

    pub fn with_pickup_details<S: Into<String>>(mut self, address: S, phone: S) -> Self {
        self.pickup_address = Some(address.into());
        self.pickup_phone = Some(phone.into());
        self
    }
}

//--------------------------------------    Ledger types       ---------------------------------------------------------
/// Identifies an external event: the provider that sent it and the provider's own event id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub provider: String,
    pub event_id: String,
}

impl EventKey {
    pub fn new<S: Into<String>>(provider: S, event_id: S) -> Self {
        Self { provider: provider.into(), event_id: event_id.into() }
    }
}

impl Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.event_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    InFlight,
    Processed,
    Failed,
}

string_enum!(LedgerStatus { InFlight => "in_flight", Processed => "processed", Failed => "failed" });

/// How much the authenticity of a webhook could be established. Anything other than `Verified` is surfaced to the
/// tenant in the unverified-events audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    NoSecretConfigured,
    MissingSignature,
}

string_enum!(VerificationStatus {
    Verified => "verified",
    NoSecretConfigured => "no_secret_configured",
    MissingSignature => "missing_signature",
});

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    pub status: LedgerStatus,
    /// The JSON-serialized handler result. Only set once the record is `Processed`.
    pub result: Option<String>,
    pub tenant_id: Option<String>,
    pub verification: VerificationStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub claimed_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl IdempotencyRecord {
    pub fn key(&self) -> EventKey {
        EventKey::new(self.provider.as_str(), self.event_id.as_str())
    }
}

//--------------------------------------    Refund types       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundSource {
    /// Initiated through the refund endpoint.
    Api,
    /// Reported by the payment processor.
    Webhook,
}

string_enum!(RefundSource { Api => "api", Webhook => "webhook" });

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RefundRecord {
    pub refund_id: String,
    pub order_id: OrderId,
    pub amount: Cents,
    pub source: RefundSource,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRefund {
    pub refund_id: String,
    pub order_id: OrderId,
    pub amount: Cents,
    pub source: RefundSource,
    pub reason: Option<String>,
}

//--------------------------------------     Audit log         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub actor: String,
    pub old_order_status: OrderStatusType,
    pub new_order_status: OrderStatusType,
    pub old_payment_status: PaymentStatusType,
    pub new_payment_status: PaymentStatusType,
    pub old_version: i64,
    pub created_at: DateTime<Utc>,
}
