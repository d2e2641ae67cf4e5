use std::time::Duration;

use settle_common::Secret;

use crate::{
    fees::FeeConfig,
    helpers::{SecretLookup, SignatureVerifier, DEFAULT_SIGNATURE_TOLERANCE_SECS},
};

/// Everything the engine needs to know at construction time. There is no global configuration state.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub fees: FeeConfig,
    pub webhooks: WebhookSecurityConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone)]
pub struct WebhookSecurityConfig {
    /// The payment processor's platform-wide signing secret. Blank means "not configured".
    pub payment_webhook_secret: Secret<String>,
    pub signature_tolerance_secs: i64,
    /// Reject delivery webhooks that carry no signature header instead of processing them as unverified.
    pub delivery_require_signature: bool,
}

impl Default for WebhookSecurityConfig {
    fn default() -> Self {
        Self {
            payment_webhook_secret: Secret::default(),
            signature_tolerance_secs: DEFAULT_SIGNATURE_TOLERANCE_SECS,
            delivery_require_signature: false,
        }
    }
}

impl WebhookSecurityConfig {
    pub fn payment_verifier(&self) -> SignatureVerifier {
        SignatureVerifier::stripe(self.signature_tolerance_secs)
    }

    pub fn delivery_verifier(&self) -> SignatureVerifier {
        SignatureVerifier::uber(self.delivery_require_signature)
    }

    pub fn payment_secret(&self) -> SecretLookup {
        if self.payment_webhook_secret.is_blank() {
            SecretLookup::NotConfigured
        } else {
            SecretLookup::Found(self.payment_webhook_secret.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// How long a duplicate delivery waits for the first delivery of the same event to finish.
    pub in_flight_wait: Duration,
    pub poll_interval: Duration,
    /// An in-flight claim older than this is assumed to belong to a crashed worker and may be reclaimed.
    pub lease_timeout: Duration,
    /// Processed ledger rows older than this may be purged.
    pub retention: Duration,
    /// The longest time either provider keeps redelivering an event.
    pub provider_redelivery_window: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            in_flight_wait: Duration::from_millis(3_000),
            poll_interval: Duration::from_millis(100),
            lease_timeout: Duration::from_secs(60),
            retention: Duration::from_secs(30 * 86_400),
            provider_redelivery_window: Duration::from_secs(3 * 86_400),
        }
    }
}

impl LedgerConfig {
    /// Purging rows inside the redelivery window would let a late redelivery run its handler a second time.
    pub fn retention_enabled(&self) -> bool {
        self.retention >= self.provider_redelivery_window
    }
}
