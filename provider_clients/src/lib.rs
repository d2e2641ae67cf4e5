//! Thin REST clients for the two external providers the settlement server talks to: a Stripe-style card payment
//! processor and an Uber-Direct-style delivery provider.
//!
//! Every request runs with a connect timeout and a total timeout. Failures are classified in [`ProviderError`] so that
//! callers can tell a transient outage (retry later) from a rejected request (don't).
mod config;
mod error;
mod http;
mod stripe;
mod uber;

pub use config::{HttpTimeouts, StripeConfig, UberDirectConfig};
pub use error::ProviderError;
pub use stripe::{NewStripeRefund, StripeApi, StripePaymentIntent, StripeRefund};
pub use uber::{ManifestItem, UberDelivery, UberDeliveryRequest, UberDirectApi, UberQuote, UberQuoteRequest};
