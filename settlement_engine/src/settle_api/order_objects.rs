use serde::{Deserialize, Serialize};
use settle_common::{dollars, optional_dollars, Cents};

use crate::db_types::{Order, OrderId, OrderType, PaymentStatusType, RefundSource};

/// A request to place a new order. Money is given in decimal dollars and the tax rate in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub tenant_id: String,
    pub order_number: String,
    pub order_type: OrderType,
    #[serde(with = "dollars")]
    pub subtotal: Cents,
    #[serde(default, with = "optional_dollars")]
    pub delivery_fee: Option<Cents>,
    #[serde(default, with = "optional_dollars")]
    pub tip: Option<Cents>,
    #[serde(default, with = "optional_dollars")]
    pub discount: Option<Cents>,
    /// Percent. Defaults to the tenant's configured rate.
    #[serde(default)]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
}

impl CreateOrderRequest {
    pub fn new<S: Into<String>>(tenant_id: S, order_number: S, order_type: OrderType, subtotal: Cents) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            order_number: order_number.into(),
            order_type,
            subtotal,
            delivery_fee: None,
            tip: None,
            discount: None,
            tax_rate: None,
            currency: None,
            payment_intent_id: None,
            customer_name: None,
            customer_phone: None,
            delivery_address: None,
        }
    }

    pub fn with_tax_rate(mut self, percent: f64) -> Self {
        self.tax_rate = Some(percent);
        self
    }

    pub fn with_delivery_fee(mut self, fee: Cents) -> Self {
        self.delivery_fee = Some(fee);
        self
    }

    pub fn with_tip(mut self, tip: Cents) -> Self {
        self.tip = Some(tip);
        self
    }

    pub fn with_discount(mut self, discount: Cents) -> Self {
        self.discount = Some(discount);
        self
    }

    pub fn with_payment_intent<S: Into<String>>(mut self, payment_intent_id: S) -> Self {
        self.payment_intent_id = Some(payment_intent_id.into());
        self
    }

    pub fn with_customer<S: Into<String>>(mut self, name: S, phone: S, address: S) -> Self {
        self.customer_name = Some(name.into());
        self.customer_phone = Some(phone.into());
        self.delivery_address = Some(address.into());
        self
    }
}

/// How a refund changes the refunded amount of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundAmount {
    /// Add this amount to what has been refunded so far.
    Incremental(Cents),
    /// The provider's running total of everything refunded on the charge.
    Cumulative(Cents),
    /// The provider reported a refund without an amount. Only the payment status changes.
    StatusOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundApplication {
    /// The processor's refund id. Used to recognise a refund that arrives through more than one path.
    pub refund_id: Option<String>,
    pub amount: RefundAmount,
    pub source: RefundSource,
    pub reason: Option<String>,
}

impl RefundApplication {
    pub fn new(refund_id: Option<String>, amount: RefundAmount, source: RefundSource) -> Self {
        Self { refund_id, amount, source, reason: None }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

/// A staff or customer refund request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundCommand {
    pub amount: RefundRequestAmount,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundRequestAmount {
    /// Whatever is left to refund.
    Full,
    Partial(Cents),
}

impl RefundCommand {
    pub fn full(reason: Option<String>) -> Self {
        Self { amount: RefundRequestAmount::Full, reason }
    }

    pub fn partial(amount: Cents, reason: Option<String>) -> Self {
        Self { amount: RefundRequestAmount::Partial(amount), reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub order_id: OrderId,
    pub refund_id: String,
    #[serde(with = "dollars")]
    pub amount: Cents,
    #[serde(with = "dollars")]
    pub refunded_amount: Cents,
    pub payment_status: PaymentStatusType,
}

/// The result of a guarded order write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderChange {
    Written { before: Order, after: Order },
    /// Nothing needed changing. Carries the reason and the order as it currently stands.
    Unchanged { order: Order, reason: String },
}

impl OrderChange {
    pub fn order(&self) -> &Order {
        match self {
            Self::Written { after, .. } => after,
            Self::Unchanged { order, .. } => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Written { after, .. } => after,
            Self::Unchanged { order, .. } => order,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}
