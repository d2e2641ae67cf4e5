use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_common::Cents;

use crate::{db_types::OrderId, traits::ExternalServiceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub order_id: OrderId,
    /// Our order id. Providers echo it back as `external_id` in their webhooks. Order numbers are only unique within a
    /// tenant, so they cannot be used here.
    pub external_id: String,
    /// The human-readable order number, for the courier's manifest.
    pub order_number: String,
    pub pickup_name: String,
    pub pickup_address: String,
    pub pickup_phone: String,
    pub dropoff_name: String,
    pub dropoff_address: String,
    pub dropoff_phone: String,
    pub manifest_total: Cents,
    pub tip: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryQuote {
    pub quote_id: String,
    pub fee: Cents,
    pub currency: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub dropoff_eta: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryHandle {
    pub delivery_id: String,
    pub status: String,
    pub fee: Cents,
    pub tracking_url: Option<String>,
}

#[allow(async_fn_in_trait)]
pub trait DeliveryProvider: Clone {
    async fn quote(&self, request: &DeliveryRequest) -> Result<DeliveryQuote, ExternalServiceError>;

    /// Creates the delivery against a previously obtained quote.
    async fn accept(
        &self,
        quote: &DeliveryQuote,
        request: &DeliveryRequest,
    ) -> Result<DeliveryHandle, ExternalServiceError>;

    async fn delivery_status(&self, delivery_id: &str) -> Result<DeliveryHandle, ExternalServiceError>;
}
