use log::*;
use provider_clients::{
    ManifestItem,
    ProviderError,
    UberDirectApi,
    UberDirectConfig,
    UberDeliveryRequest,
    UberQuoteRequest,
};
use settle_common::Cents;
use settlement_engine::traits::{
    DeliveryHandle,
    DeliveryProvider,
    DeliveryQuote,
    DeliveryRequest,
    ExternalServiceError,
};

use super::external_error;

#[derive(Debug, Clone)]
pub struct UberDelivery {
    api: UberDirectApi,
}

impl UberDelivery {
    pub fn new(config: UberDirectConfig) -> Result<Self, ProviderError> {
        let api = UberDirectApi::new(config)?;
        Ok(Self { api })
    }
}

impl DeliveryProvider for UberDelivery {
    async fn quote(&self, request: &DeliveryRequest) -> Result<DeliveryQuote, ExternalServiceError> {
        let quote = self.api.create_quote(&quote_request(request)).await.map_err(|e| external_error("uber", e))?;
        trace!("🚚️ Quote {} for order {}: {}", quote.id, request.order_id, Cents::from(quote.fee));
        Ok(DeliveryQuote {
            quote_id: quote.id,
            fee: Cents::from(quote.fee),
            currency: quote.currency.to_uppercase(),
            expires_at: quote.expires,
            dropoff_eta: quote.dropoff_eta,
        })
    }

    async fn accept(
        &self,
        quote: &DeliveryQuote,
        request: &DeliveryRequest,
    ) -> Result<DeliveryHandle, ExternalServiceError> {
        let delivery = self
            .api
            .create_delivery(&delivery_request(quote, request))
            .await
            .map_err(|e| external_error("uber", e))?;
        Ok(DeliveryHandle {
            delivery_id: delivery.id,
            status: delivery.status,
            fee: Cents::from(delivery.fee),
            tracking_url: delivery.tracking_url,
        })
    }

    async fn delivery_status(&self, delivery_id: &str) -> Result<DeliveryHandle, ExternalServiceError> {
        let delivery = self.api.fetch_delivery(delivery_id).await.map_err(|e| external_error("uber", e))?;
        Ok(DeliveryHandle {
            delivery_id: delivery.id,
            status: delivery.status,
            fee: Cents::from(delivery.fee),
            tracking_url: delivery.tracking_url,
        })
    }
}

fn quote_request(request: &DeliveryRequest) -> UberQuoteRequest {
    UberQuoteRequest {
        pickup_address: request.pickup_address.clone(),
        dropoff_address: request.dropoff_address.clone(),
        pickup_phone_number: request.pickup_phone.clone(),
        dropoff_phone_number: request.dropoff_phone.clone(),
        manifest_total_value: request.manifest_total.value(),
        external_store_id: None,
    }
}

// The whole order travels as a single manifest line
fn delivery_request(quote: &DeliveryQuote, request: &DeliveryRequest) -> UberDeliveryRequest {
    UberDeliveryRequest {
        quote_id: quote.quote_id.clone(),
        pickup_name: request.pickup_name.clone(),
        pickup_address: request.pickup_address.clone(),
        pickup_phone_number: request.pickup_phone.clone(),
        dropoff_name: request.dropoff_name.clone(),
        dropoff_address: request.dropoff_address.clone(),
        dropoff_phone_number: request.dropoff_phone.clone(),
        manifest_items: vec![ManifestItem {
            name: format!("Order {}", request.order_number),
            quantity: 1,
            price: request.manifest_total.value(),
        }],
        manifest_total_value: request.manifest_total.value(),
        external_id: request.external_id.clone(),
        tip: request.tip.value(),
    }
}
