use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_common::{dollars, optional_dollars, Cents, Rate};
use settlement_engine::{
    db_types::{NewTenant, Order, OrderId, OrderStatusType, OrderType, PaymentStatusType},
    order_objects::RefundCommand,
    traits::CaptureStatus,
};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// An order as the API presents it: money in decimal dollars and the tax rate in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub tenant_id: String,
    pub order_number: String,
    pub order_type: OrderType,
    pub currency: String,
    pub tax_rate: f64,
    #[serde(with = "dollars")]
    pub subtotal: Cents,
    #[serde(with = "dollars")]
    pub tax: Cents,
    #[serde(with = "dollars")]
    pub delivery_fee: Cents,
    #[serde(with = "dollars")]
    pub merchant_fee: Cents,
    #[serde(with = "dollars")]
    pub tip: Cents,
    #[serde(with = "dollars")]
    pub discount: Cents,
    #[serde(with = "dollars")]
    pub processor_fee: Cents,
    #[serde(with = "dollars")]
    pub total: Cents,
    #[serde(with = "dollars")]
    pub refunded_amount: Cents,
    pub order_status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    pub payment_intent_id: Option<String>,
    pub delivery_id: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            tenant_id: order.tenant_id,
            order_number: order.order_number,
            order_type: order.order_type,
            currency: order.currency,
            tax_rate: order.tax_rate.as_percent(),
            subtotal: order.subtotal,
            tax: order.tax,
            delivery_fee: order.delivery_fee,
            merchant_fee: order.merchant_fee,
            tip: order.tip,
            discount: order.discount,
            processor_fee: order.processor_fee,
            total: order.total,
            refunded_amount: order.refunded_amount,
            order_status: order.order_status,
            payment_status: order.payment_status,
            payment_intent_id: order.payment_intent_id,
            delivery_id: order.delivery_id,
            version: order.version,
            created_at: order.created_at,
            updated_at: order.updated_at,
            completed_at: order.completed_at,
            refunded_at: order.refunded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountRequest {
    #[serde(with = "dollars")]
    pub amount: Cents,
}

/// Either `{"amount": 30.00}` or `{"full_refund": true}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundBody {
    #[serde(default, with = "optional_dollars")]
    pub amount: Option<Cents>,
    #[serde(default)]
    pub full_refund: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl TryFrom<RefundBody> for RefundCommand {
    type Error = ServerError;

    fn try_from(body: RefundBody) -> Result<Self, Self::Error> {
        match (body.full_refund, body.amount) {
            (true, None) => Ok(RefundCommand::full(body.reason)),
            (false, Some(amount)) => Ok(RefundCommand::partial(amount, body.reason)),
            (true, Some(_)) => {
                Err(ServerError::InvalidRequestBody("Give either an amount or full_refund, not both".into()))
            },
            (false, None) => Err(ServerError::InvalidRequestBody("A refund needs an amount or full_refund".into())),
        }
    }
}

/// A tenant's settlement configuration. The fee is in dollars and the tax rate in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantUpdate {
    pub name: String,
    #[serde(default, with = "optional_dollars")]
    pub merchant_fee: Option<Cents>,
    #[serde(default)]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub delivery_webhook_secret: Option<String>,
    #[serde(default)]
    pub pickup_address: Option<String>,
    #[serde(default)]
    pub pickup_phone: Option<String>,
}

impl TenantUpdate {
    pub fn into_new_tenant(self, tenant_id: &str) -> Result<NewTenant, ServerError> {
        let mut tenant = NewTenant::new(tenant_id.to_string(), self.name);
        if let Some(fee) = self.merchant_fee {
            tenant = tenant.with_merchant_fee(fee);
        }
        if let Some(percent) = self.tax_rate {
            let rate = Rate::from_percent(percent).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
            tenant = tenant.with_tax_rate(rate);
        }
        tenant.delivery_webhook_secret = self.delivery_webhook_secret;
        tenant.pickup_address = self.pickup_address;
        tenant.pickup_phone = self.pickup_phone;
        Ok(tenant)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusView {
    pub payment_intent_id: String,
    pub status: String,
    #[serde(with = "dollars")]
    pub amount: Cents,
    #[serde(with = "dollars")]
    pub amount_received: Cents,
    pub currency: String,
}

impl From<CaptureStatus> for PaymentStatusView {
    fn from(status: CaptureStatus) -> Self {
        Self {
            payment_intent_id: status.payment_intent_id,
            status: status.status,
            amount: status.amount,
            amount_received: status.amount_received,
            currency: status.currency,
        }
    }
}
