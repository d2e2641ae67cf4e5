//! Adapters that plug the concrete provider clients into the engine's [`PaymentProcessor`] and [`DeliveryProvider`]
//! traits.
//!
//! [`PaymentProcessor`]: settlement_engine::traits::PaymentProcessor
//! [`DeliveryProvider`]: settlement_engine::traits::DeliveryProvider
mod stripe;
mod uber;

use provider_clients::ProviderError;
use settlement_engine::traits::ExternalServiceError;
pub use stripe::StripeProcessor;
pub use uber::UberDelivery;

pub(crate) fn external_error(provider: &str, e: ProviderError) -> ExternalServiceError {
    let message = format!("{provider}: {e}");
    if e.is_retryable() {
        ExternalServiceError::retryable(message)
    } else {
        ExternalServiceError::permanent(message)
    }
}
