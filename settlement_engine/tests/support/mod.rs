#![allow(dead_code)]
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use settle_common::{Cents, Secret};
use settlement_engine::{
    db_types::{Order, OrderType},
    events::EventProducers,
    fees::FeeConfig,
    order_objects::CreateOrderRequest,
    test_utils::prepare_env::{drop_database, prepare_test_env, random_db_path},
    traits::{CaptureStatus, ExternalServiceError, PaymentProcessor, ProcessorRefund, RefundRequest},
    LedgerConfig,
    OrderFlowApi,
    SqliteDatabase,
    WebhookSecurityConfig,
};

pub const PAYMENT_SECRET: &str = "whsec_test_secret";

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = settlement_engine::traits::SettlementDatabase::url(&db).to_string();
    db.close().await;
    drop_database(&url).await;
}

pub fn order_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), FeeConfig::default(), EventProducers::default())
}

pub fn fast_ledger() -> LedgerConfig {
    LedgerConfig {
        in_flight_wait: std::time::Duration::from_millis(2_000),
        poll_interval: std::time::Duration::from_millis(20),
        ..LedgerConfig::default()
    }
}

pub fn security() -> WebhookSecurityConfig {
    WebhookSecurityConfig { payment_webhook_secret: Secret::new(PAYMENT_SECRET.to_string()), ..Default::default() }
}

/// A pickup order with no tax whose total comes to exactly $50.00 ($48.30 + $1.70 processing).
pub async fn fifty_dollar_order(orders: &OrderFlowApi<SqliteDatabase>, number: &str) -> Order {
    let request = CreateOrderRequest::new("tenant_1", number, OrderType::Pickup, Cents::from(4_830))
        .with_tax_rate(0.0)
        .with_payment_intent(format!("pi_{number}"));
    let order = orders.create_order(request).await.expect("Error creating order");
    assert_eq!(order.total, Cents::from(5_000));
    order
}

pub async fn paid_fifty_dollar_order(orders: &OrderFlowApi<SqliteDatabase>, number: &str) -> Order {
    let order = fifty_dollar_order(orders, number).await;
    let intent = order.payment_intent_id.clone().unwrap_or_default();
    orders.mark_paid(&order.id, &intent, "test").await.expect("Error marking order paid").into_order()
}

/// A payment processor that refunds whatever it is asked to, unless told to fail.
#[derive(Clone, Default)]
pub struct FakeProcessor {
    calls: Arc<AtomicU64>,
    failing: Arc<AtomicBool>,
}

impl FakeProcessor {
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_with_timeouts(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl PaymentProcessor for FakeProcessor {
    async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, ExternalServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExternalServiceError::retryable("Request to the payment processor timed out"));
        }
        Ok(ProcessorRefund { refund_id: format!("re_{n}"), amount: request.amount, status: "succeeded".into() })
    }

    async fn fetch_payment_status(&self, payment_intent_id: &str) -> Result<CaptureStatus, ExternalServiceError> {
        Ok(CaptureStatus {
            payment_intent_id: payment_intent_id.to_string(),
            status: "succeeded".into(),
            amount: Cents::from(5_000),
            amount_received: Cents::from(5_000),
            currency: "usd".into(),
        })
    }
}
