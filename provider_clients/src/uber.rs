use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::{
    http::{build_client, endpoint, send_json},
    ProviderError,
    UberDirectConfig,
};

const PROVIDER: &str = "🚚️ Uber Direct";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UberQuoteRequest {
    pub pickup_address: String,
    pub dropoff_address: String,
    pub pickup_phone_number: String,
    pub dropoff_phone_number: String,
    pub manifest_total_value: i64,
    pub external_store_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UberQuote {
    pub id: String,
    pub fee: i64,
    pub currency: String,
    pub expires: Option<DateTime<Utc>>,
    pub dropoff_eta: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub name: String,
    pub quantity: u32,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UberDeliveryRequest {
    pub quote_id: String,
    pub pickup_name: String,
    pub pickup_address: String,
    pub pickup_phone_number: String,
    pub dropoff_name: String,
    pub dropoff_address: String,
    pub dropoff_phone_number: String,
    pub manifest_items: Vec<ManifestItem>,
    pub manifest_total_value: i64,
    /// Echoed back in every delivery webhook. We send the order number.
    pub external_id: String,
    pub tip: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UberDelivery {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub fee: i64,
    pub external_id: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Clone)]
pub struct UberDirectApi {
    config: UberDirectConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for UberDirectApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UberDirectApi ({}, customer {})", self.config.api_url, self.config.customer_id)
    }
}

impl UberDirectApi {
    pub fn new(config: UberDirectConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::with_capacity(1);
        if !config.api_token.is_blank() {
            let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_token.reveal()))
                .map_err(|e| ProviderError::Configuration(e.to_string()))?;
            headers.insert(AUTHORIZATION, auth);
        }
        let client = build_client(config.timeouts, headers)?;
        Ok(Self { config, client: Arc::new(client) })
    }

    fn url(&self, path: &str) -> Result<String, ProviderError> {
        if self.config.customer_id.trim().is_empty() {
            return Err(ProviderError::Configuration("No Uber Direct customer id has been configured".into()));
        }
        Ok(endpoint(&self.config.api_url, &format!("/v1/customers/{}{path}", self.config.customer_id)))
    }

    pub async fn create_quote(&self, request: &UberQuoteRequest) -> Result<UberQuote, ProviderError> {
        let url = self.url("/delivery_quotes")?;
        trace!("{PROVIDER}: Requesting a quote to {}", request.dropoff_address);
        let quote = send_json::<UberQuote>(PROVIDER, self.client.post(url).json(request)).await?;
        debug!("{PROVIDER}: Quote {} costs {} {}", quote.id, quote.fee, quote.currency);
        Ok(quote)
    }

    pub async fn create_delivery(&self, request: &UberDeliveryRequest) -> Result<UberDelivery, ProviderError> {
        let url = self.url("/deliveries")?;
        debug!("{PROVIDER}: Creating delivery for {} with quote {}", request.external_id, request.quote_id);
        let delivery = send_json::<UberDelivery>(PROVIDER, self.client.post(url).json(request)).await?;
        info!("{PROVIDER}: Delivery {} created for {} ({})", delivery.id, request.external_id, delivery.status);
        Ok(delivery)
    }

    pub async fn fetch_delivery(&self, delivery_id: &str) -> Result<UberDelivery, ProviderError> {
        let url = self.url(&format!("/deliveries/{delivery_id}"))?;
        send_json(PROVIDER, self.client.get(url)).await
    }
}
