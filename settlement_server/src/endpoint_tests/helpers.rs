use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
};
use chrono::Utc;
use settle_common::{Cents, Secret};
use settlement_engine::{
    db_types::{Order, OrderType},
    events::EventProducers,
    fees::FeeConfig,
    helpers::{sign_stripe_payload, STRIPE_SIGNATURE_HEADER},
    order_objects::CreateOrderRequest,
    test_utils::prepare_env::{drop_database, prepare_test_env, random_db_path},
    traits::SettlementDatabase,
    LedgerConfig,
    OrderFlowApi,
    SqliteDatabase,
    WebhookApi,
    WebhookSecurityConfig,
};

pub const PAYMENT_SECRET: &str = "whsec_endpoint_tests";

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    drop_database(&url).await;
}

pub fn order_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), FeeConfig::default(), EventProducers::default())
}

pub fn webhook_api(orders: &OrderFlowApi<SqliteDatabase>) -> WebhookApi<SqliteDatabase> {
    let security =
        WebhookSecurityConfig { payment_webhook_secret: Secret::new(PAYMENT_SECRET.to_string()), ..Default::default() };
    WebhookApi::new(orders.clone(), security, LedgerConfig::default())
}

/// A tax-free pickup order that comes to exactly $50.00, paid through payment intent `pi_{number}`.
pub async fn paid_fifty_dollar_order(orders: &OrderFlowApi<SqliteDatabase>, number: &str) -> Order {
    let request = CreateOrderRequest::new("tenant_1", number, OrderType::Pickup, Cents::from(4_830))
        .with_tax_rate(0.0)
        .with_payment_intent(format!("pi_{number}"));
    let order = orders.create_order(request).await.expect("Error creating order");
    let intent = format!("pi_{number}");
    orders.mark_paid(&order.id, &intent, "test").await.expect("Error marking order paid").into_order()
}

pub fn stripe_signature(body: &str) -> (&'static str, String) {
    let secret = Secret::new(PAYMENT_SECRET.to_string());
    let header = sign_stripe_payload(&secret, Utc::now().timestamp(), body.as_bytes()).expect("Could not sign body");
    (STRIPE_SIGNATURE_HEADER, header)
}

/// Sends the request and returns the status and the body as a string.
pub async fn call<S, R, B>(app: &S, req: R) -> (StatusCode, String)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::call_service(app, req).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub fn json_body(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response was not JSON ({e}): {body}"))
}
