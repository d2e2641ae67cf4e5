use std::{str::FromStr, time::Duration};

use log::*;
use settle_common::Secret;

pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";
pub const DEFAULT_UBER_API_URL: &str = "https://api.uber.com";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    /// Upper bound on the whole request, including reading the response body.
    pub total: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            total: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl HttpTimeouts {
    pub fn new_from_env_or_default() -> Self {
        let connect = env_or("SETTLE_HTTP_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS);
        let total = env_or("SETTLE_HTTP_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS);
        Self { connect: Duration::from_millis(connect), total: Duration::from_millis(total) }
    }
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub timeouts: HttpTimeouts,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_STRIPE_API_URL.to_string(),
            api_key: Secret::default(),
            timeouts: HttpTimeouts::default(),
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("SETTLE_STRIPE_API_URL").unwrap_or_else(|_| DEFAULT_STRIPE_API_URL.to_string());
        let api_key = Secret::new(std::env::var("SETTLE_STRIPE_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SETTLE_STRIPE_API_KEY is not set. Refunds and payment lookups will be rejected by the processor.");
            String::default()
        }));
        Self { api_url, api_key, timeouts: HttpTimeouts::new_from_env_or_default() }
    }
}

#[derive(Debug, Clone)]
pub struct UberDirectConfig {
    pub api_url: String,
    pub customer_id: String,
    pub api_token: Secret<String>,
    pub timeouts: HttpTimeouts,
}

impl Default for UberDirectConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_UBER_API_URL.to_string(),
            customer_id: String::default(),
            api_token: Secret::default(),
            timeouts: HttpTimeouts::default(),
        }
    }
}

impl UberDirectConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("SETTLE_UBER_API_URL").unwrap_or_else(|_| DEFAULT_UBER_API_URL.to_string());
        let customer_id = std::env::var("SETTLE_UBER_CUSTOMER_ID").unwrap_or_else(|_| {
            warn!("🪛️ SETTLE_UBER_CUSTOMER_ID is not set. Dispatching deliveries will fail.");
            String::default()
        });
        let api_token = Secret::new(std::env::var("SETTLE_UBER_API_TOKEN").unwrap_or_default());
        Self { api_url, customer_id, api_token, timeouts: HttpTimeouts::new_from_env_or_default() }
    }
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("🪛️ {s} is not a valid value for {name}. Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
