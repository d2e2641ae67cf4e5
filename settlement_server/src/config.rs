use std::{env, str::FromStr, time::Duration};

use log::*;
use provider_clients::{StripeConfig, UberDirectConfig};
use settle_common::{helpers::parse_boolean_flag, Cents, Rate, Secret};
use settlement_engine::{fees::FeeConfig, EngineConfig, LedgerConfig, WebhookSecurityConfig};

const DEFAULT_SETTLE_HOST: &str = "127.0.0.1";
const DEFAULT_SETTLE_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/settlement.db";
const DEFAULT_RETENTION_CHECK_INTERVAL: Duration = Duration::from_secs(3_600);
const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub engine: EngineConfig,
    pub stripe: StripeConfig,
    pub uber: UberDirectConfig,
    /// How often the retention worker looks for processed webhook records to purge.
    pub retention_check_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SETTLE_HOST.to_string(),
            port: DEFAULT_SETTLE_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            engine: EngineConfig::default(),
            stripe: StripeConfig::default(),
            uber: UberDirectConfig::default(),
            retention_check_interval: DEFAULT_RETENTION_CHECK_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SETTLE_HOST").ok().unwrap_or_else(|| DEFAULT_SETTLE_HOST.into());
        let port = parse_env("SETTLE_PORT", DEFAULT_SETTLE_PORT);
        let database_url = env::var("SETTLE_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SETTLE_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let engine = EngineConfig {
            fees: fee_config_from_env(),
            webhooks: webhook_config_from_env(),
            ledger: ledger_config_from_env(),
        };
        let retention_check_interval =
            Duration::from_secs(parse_env("SETTLE_RETENTION_CHECK_SECS", DEFAULT_RETENTION_CHECK_INTERVAL.as_secs()));
        Self {
            host,
            port,
            database_url,
            engine,
            stripe: StripeConfig::new_from_env_or_default(),
            uber: UberDirectConfig::new_from_env_or_default(),
            retention_check_interval,
        }
    }
}

fn fee_config_from_env() -> FeeConfig {
    let defaults = FeeConfig::default();
    let processor_rate = env::var("SETTLE_PROCESSOR_FEE_PERCENT")
        .ok()
        .and_then(|s| {
            s.parse::<f64>()
                .map_err(|e| e.to_string())
                .and_then(|p| Rate::from_percent(p).map_err(|e| e.to_string()))
                .map_err(|e| {
                    error!(
                        "🪛️ {s} is not a valid value for SETTLE_PROCESSOR_FEE_PERCENT. {e} Using the default, {}, \
                         instead.",
                        defaults.processor_rate
                    )
                })
                .ok()
        })
        .unwrap_or(defaults.processor_rate);
    let processor_fixed =
        Cents::from(parse_env("SETTLE_PROCESSOR_FEE_FIXED_CENTS", defaults.processor_fixed.value()));
    let default_merchant_fee =
        Cents::from(parse_env("SETTLE_DEFAULT_MERCHANT_FEE_CENTS", defaults.default_merchant_fee.value()));
    if processor_fixed.is_negative() || default_merchant_fee.is_negative() {
        error!("🪛️ Fees cannot be negative. Using the default fee configuration instead.");
        return defaults;
    }
    info!("🪛️ Processor fee is {processor_rate} + {processor_fixed}. Default merchant fee is {default_merchant_fee}.");
    FeeConfig { processor_rate, processor_fixed, default_merchant_fee }
}

fn webhook_config_from_env() -> WebhookSecurityConfig {
    let defaults = WebhookSecurityConfig::default();
    let payment_webhook_secret = env::var("SETTLE_PAYMENT_WEBHOOK_SECRET").map(Secret::new).unwrap_or_else(|_| {
        warn!(
            "🪛️ SETTLE_PAYMENT_WEBHOOK_SECRET is not set. Payment webhooks will be processed WITHOUT signature \
             verification and flagged as unverified."
        );
        Secret::default()
    });
    let signature_tolerance_secs = parse_env("SETTLE_SIGNATURE_TOLERANCE_SECS", defaults.signature_tolerance_secs);
    let delivery_require_signature = parse_boolean_flag(env::var("SETTLE_DELIVERY_REQUIRE_SIGNATURE").ok(), false);
    if !delivery_require_signature {
        info!(
            "🪛️ Unsigned delivery webhooks will be processed and recorded as unverified. Set \
             SETTLE_DELIVERY_REQUIRE_SIGNATURE=1 to reject them instead."
        );
    }
    WebhookSecurityConfig { payment_webhook_secret, signature_tolerance_secs, delivery_require_signature }
}

fn ledger_config_from_env() -> LedgerConfig {
    let defaults = LedgerConfig::default();
    let in_flight_wait =
        Duration::from_millis(parse_env("SETTLE_INFLIGHT_WAIT_MS", defaults.in_flight_wait.as_millis() as u64));
    let lease_timeout =
        Duration::from_secs(parse_env("SETTLE_INFLIGHT_LEASE_SECS", defaults.lease_timeout.as_secs()));
    let retention_days = parse_env("SETTLE_LEDGER_RETENTION_DAYS", defaults.retention.as_secs() / SECONDS_PER_DAY);
    let redelivery_days =
        parse_env("SETTLE_PROVIDER_REDELIVERY_DAYS", defaults.provider_redelivery_window.as_secs() / SECONDS_PER_DAY);
    let config = LedgerConfig {
        in_flight_wait,
        lease_timeout,
        retention: Duration::from_secs(retention_days * SECONDS_PER_DAY),
        provider_redelivery_window: Duration::from_secs(redelivery_days * SECONDS_PER_DAY),
        ..defaults
    };
    if !config.retention_enabled() {
        warn!(
            "🪛️ The ledger retention period ({retention_days} days) is shorter than the provider redelivery window \
             ({redelivery_days} days). Processed webhook records will not be purged."
        );
    }
    config
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}
