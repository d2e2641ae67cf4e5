use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::{
    http::{build_client, endpoint, send_json},
    ProviderError,
    StripeConfig,
};

const PROVIDER: &str = "💸️ Stripe";

/// A refund to be created against a payment intent. Amounts are in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStripeRefund {
    pub payment_intent: String,
    pub amount: i64,
    /// Our order id, stored in the refund's metadata so that the refund webhooks can be correlated.
    pub order_id: String,
    pub reason: Option<String>,
    pub idempotency_key: String,
}

impl NewStripeRefund {
    /// The processor only accepts a fixed vocabulary for `reason`, so free text goes into the metadata.
    fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("payment_intent", self.payment_intent.clone()),
            ("amount", self.amount.to_string()),
            ("metadata[order_id]", self.order_id.clone()),
        ];
        if let Some(reason) = &self.reason {
            fields.push(("metadata[reason]", reason.clone()));
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub amount: i64,
    pub status: Option<String>,
    pub payment_intent: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_received: i64,
    pub currency: String,
}

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for StripeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StripeApi ({})", self.config.api_url)
    }
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::with_capacity(1);
        if !config.api_key.is_blank() {
            let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
                .map_err(|e| ProviderError::Configuration(e.to_string()))?;
            headers.insert(AUTHORIZATION, auth);
        }
        let client = build_client(config.timeouts, headers)?;
        Ok(Self { config, client: Arc::new(client) })
    }

    fn check_configured(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_blank() {
            return Err(ProviderError::Configuration("No Stripe API key has been configured".into()));
        }
        Ok(())
    }

    /// Creates a refund. The idempotency key makes a retried call return the original refund rather than refunding
    /// twice.
    pub async fn create_refund(&self, refund: &NewStripeRefund) -> Result<StripeRefund, ProviderError> {
        self.check_configured()?;
        debug!("{PROVIDER}: Refunding {} on {} for order {}", refund.amount, refund.payment_intent, refund.order_id);
        let request = self
            .client
            .post(endpoint(&self.config.api_url, "/v1/refunds"))
            .header("Idempotency-Key", refund.idempotency_key.as_str())
            .form(&refund.form_fields());
        let result = send_json::<StripeRefund>(PROVIDER, request).await?;
        info!("{PROVIDER}: Refund {} created for {} ({:?})", result.id, refund.payment_intent, result.status);
        Ok(result)
    }

    pub async fn fetch_payment_intent(&self, payment_intent_id: &str) -> Result<StripePaymentIntent, ProviderError> {
        self.check_configured()?;
        let path = format!("/v1/payment_intents/{payment_intent_id}");
        trace!("{PROVIDER}: Fetching payment intent {payment_intent_id}");
        send_json(PROVIDER, self.client.get(endpoint(&self.config.api_url, &path))).await
    }
}
