use std::str::FromStr;

use chrono::Utc;
use cucumber::{given, then, when};
use settle_common::{Cents, Secret};
use settlement_engine::{
    db_types::{OrderStatusType, OrderType, PaymentStatusType},
    helpers::{sign_stripe_payload, WebhookHeaders, STRIPE_SIGNATURE_HEADER},
    order_objects::{CreateOrderRequest, RefundCommand},
    OrderFlowError,
};

use crate::{cucumber::SettlementWorld, support::PAYMENT_SECRET};

fn cents(dollars: f64) -> Cents {
    Cents::try_from_dollars(dollars).expect("Not a valid dollar amount")
}

fn error_kind(e: &OrderFlowError) -> &'static str {
    match e {
        OrderFlowError::OrderNotFound(_) => "OrderNotFound",
        OrderFlowError::InvalidTransition { .. } => "InvalidTransition",
        OrderFlowError::ConcurrentModification(_) => "ConcurrentModification",
        OrderFlowError::Validation(_) => "Validation",
        OrderFlowError::OrderAlreadyExists(_) => "OrderAlreadyExists",
        OrderFlowError::NothingToRefund(_) => "NothingToRefund",
        OrderFlowError::RefundExceedsBalance { .. } => "RefundExceedsBalance",
        OrderFlowError::DuplicateRefund(_) => "DuplicateRefund",
        OrderFlowError::DiscountNotAllowed(_) => "DiscountNotAllowed",
        OrderFlowError::ExternalServiceError { .. } => "ExternalServiceError",
        OrderFlowError::DatabaseError(_) => "DatabaseError",
    }
}

#[when(expr = "I create a pickup order {word} for ${float} with {float}% tax")]
async fn create_pickup_order(world: &mut SettlementWorld, number: String, subtotal: f64, tax: f64) {
    let system = world.system();
    let request = CreateOrderRequest::new("tenant_1".to_string(), number.clone(), OrderType::Pickup, cents(subtotal))
        .with_tax_rate(tax)
        .with_payment_intent(format!("pi_{number}"));
    let order = system.orders.create_order(request).await.expect("Error creating order");
    system.remember(&order);
}

#[given(expr = "a paid pickup order {word} for ${float} with {float}% tax")]
async fn paid_pickup_order(world: &mut SettlementWorld, number: String, subtotal: f64, tax: f64) {
    create_pickup_order(world, number.clone(), subtotal, tax).await;
    payment_confirmed(world, number).await;
}

#[when(expr = "the payment processor confirms payment for order {word}")]
async fn payment_confirmed(world: &mut SettlementWorld, number: String) {
    let system = world.system();
    let order = system.order(&number).await;
    let body = serde_json::json!({
        "id": format!("evt_paid_{number}"),
        "type": "payment_intent.succeeded",
        "data": {"object": {
            "id": format!("pi_{number}"),
            "amount": order.total.value(),
            "amount_received": order.total.value(),
            "currency": "usd"
        }}
    })
    .to_string();
    let secret = Secret::new(PAYMENT_SECRET.to_string());
    let signature = sign_stripe_payload(&secret, Utc::now().timestamp(), body.as_bytes()).expect("Could not sign");
    let headers = WebhookHeaders::new().with(STRIPE_SIGNATURE_HEADER, signature);
    system.webhooks.handle_payment_webhook(body.as_bytes(), &headers).await.expect("Webhook was not accepted");
}

#[when(expr = "staff apply a discount of ${float} to order {word}")]
async fn apply_discount(world: &mut SettlementWorld, amount: f64, number: String) {
    let system = world.system();
    let id = system.order_id(&number);
    if let Err(e) = system.orders.apply_discount(&id, cents(amount), "staff").await {
        system.last_error = Some(e);
    }
}

#[when(expr = "I refund ${float} of order {word}")]
async fn partial_refund(world: &mut SettlementWorld, amount: f64, number: String) {
    let system = world.system();
    let id = system.order_id(&number);
    system.last_error = system.refunds.refund(&id, RefundCommand::partial(cents(amount), None)).await.err();
}

#[when(expr = "I refund the rest of order {word}")]
async fn full_refund(world: &mut SettlementWorld, number: String) {
    let system = world.system();
    let id = system.order_id(&number);
    system.last_error = system.refunds.refund(&id, RefundCommand::full(None)).await.err();
}

#[when(expr = "staff move order {word} to {word}")]
async fn move_order(world: &mut SettlementWorld, number: String, status: String) {
    let system = world.system();
    let id = system.order_id(&number);
    let status = OrderStatusType::from_str(&status).expect("Not an order status");
    system.last_error = system.orders.update_order_status(&id, status, "staff").await.err();
}

#[then("the request succeeds")]
async fn request_succeeds(world: &mut SettlementWorld) {
    let system = world.system();
    assert!(system.last_error.is_none(), "Unexpected error: {:?}", system.last_error);
}

#[then(expr = "the request fails with {word}")]
async fn request_fails(world: &mut SettlementWorld, kind: String) {
    let error = world.system().last_error.take().expect("The request did not fail");
    assert_eq!(error_kind(&error), kind, "Unexpected error: {error}");
}

#[then(expr = "order {word} has a tax of ${float}, a processor fee of ${float} and a total of ${float}")]
async fn check_fees(world: &mut SettlementWorld, number: String, tax: f64, processor_fee: f64, total: f64) {
    let order = world.system().order(&number).await;
    assert_eq!(order.tax, cents(tax), "Tax is incorrect");
    assert_eq!(order.processor_fee, cents(processor_fee), "Processor fee is incorrect");
    assert_eq!(order.total, cents(total), "Total is incorrect");
}

#[then(expr = "order {word} has a discount of ${float}")]
async fn check_discount(world: &mut SettlementWorld, number: String, discount: f64) {
    let order = world.system().order(&number).await;
    assert_eq!(order.discount, cents(discount), "Discount is incorrect");
}

#[then(expr = "order {word} has refunded ${float} and its payment is {word}")]
async fn check_refunded(world: &mut SettlementWorld, number: String, refunded: f64, status: String) {
    let order = world.system().order(&number).await;
    assert_eq!(order.refunded_amount, cents(refunded), "Refunded amount is incorrect");
    assert_eq!(order.payment_status, PaymentStatusType::from_str(&status).expect("Not a payment status"));
    assert!(order.refunded_amount <= order.total);
}

#[then(expr = "order {word} is {word}")]
async fn check_status(world: &mut SettlementWorld, number: String, status: String) {
    let order = world.system().order(&number).await;
    assert_eq!(order.order_status, OrderStatusType::from_str(&status).expect("Not an order status"));
}

#[then(expr = "order {word} has {int} audit log entries")]
async fn check_audit_log(world: &mut SettlementWorld, number: String, count: usize) {
    let system = world.system();
    let id = system.order_id(&number);
    let log = system.orders.fetch_audit_log(&id).await.expect("Error fetching audit log");
    assert_eq!(log.len(), count, "Audit log length is incorrect: {log:?}");
}
