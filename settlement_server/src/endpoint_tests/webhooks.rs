use actix_web::{http::StatusCode, test, web, App};
use serde_json::json;
use settle_common::Cents;
use settlement_engine::{
    db_types::{NewTenant, OrderStatusType, OrderType, PaymentStatusType},
    helpers::UBER_SIGNATURE_HEADER,
    order_objects::CreateOrderRequest,
    SqliteDatabase,
};

use super::helpers::{call, json_body, order_api, paid_fifty_dollar_order, setup, stripe_signature, tear_down, webhook_api};
use crate::{
    routes::UnverifiedEventsRoute,
    webhook_routes::{DeliveryWebhookRoute, PaymentWebhookRoute},
};

fn payment_succeeded(event_id: &str, intent: &str) -> String {
    json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": intent, "amount": 5_000, "amount_received": 5_000, "currency": "usd"}}
    })
    .to_string()
}

fn delivery_status(event_id: &str, order_number: &str, status: &str) -> String {
    json!({
        "id": event_id,
        "kind": "event.delivery_status",
        "delivery_id": "del_9",
        "status": status,
        "data": {"id": "del_9", "external_id": order_number, "status": status}
    })
    .to_string()
}

#[actix_web::test]
async fn payment_webhooks_settle_orders_once() {
    let db = setup().await;
    let orders = order_api(&db);
    let request = CreateOrderRequest::new("tenant_1", "W-1", OrderType::Pickup, Cents::from(4_830))
        .with_tax_rate(0.0)
        .with_payment_intent("pi_W-1");
    let order = orders.create_order(request).await.unwrap();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(webhook_api(&orders)))
            .service(web::scope("/webhooks").service(PaymentWebhookRoute::<SqliteDatabase>::new())),
    )
    .await;

    let body = payment_succeeded("evt_w1", "pi_W-1");
    let req = test::TestRequest::post()
        .uri("/webhooks/payments")
        .insert_header(stripe_signature(&body))
        .set_payload(body.clone())
        .to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    let response = json_body(&response);
    assert_eq!(response["success"], true);
    assert!(!response["message"].as_str().unwrap().contains("replay"));

    let req = test::TestRequest::post()
        .uri("/webhooks/payments")
        .insert_header(stripe_signature(&body))
        .set_payload(body)
        .to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json_body(&response)["message"].as_str().unwrap().contains("replay"));

    let paid = orders.fetch_order(&order.id).await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatusType::Paid);
    assert_eq!(paid.order_status, OrderStatusType::Confirmed);
    assert_eq!(paid.version, order.version + 1);
    tear_down(db).await;
}

#[actix_web::test]
async fn unauthenticated_or_garbled_payment_webhooks_are_rejected() {
    let db = setup().await;
    let orders = order_api(&db);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(webhook_api(&orders)))
            .service(web::scope("/webhooks").service(PaymentWebhookRoute::<SqliteDatabase>::new())),
    )
    .await;

    let body = payment_succeeded("evt_w2", "pi_unknown");
    let req = test::TestRequest::post().uri("/webhooks/payments").set_payload(body.clone()).to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&response), json!({"success": false, "message": "missing_signature"}));

    let (name, signature) = stripe_signature(&body);
    let tampered = body.replace("5000", "1");
    let req = test::TestRequest::post()
        .uri("/webhooks/payments")
        .insert_header((name, signature))
        .set_payload(tampered)
        .to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&response)["message"], "invalid_signature");

    let garbage = "{not json";
    let req = test::TestRequest::post()
        .uri("/webhooks/payments")
        .insert_header(stripe_signature(garbage))
        .set_payload(garbage)
        .to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&response)["success"], false);
    tear_down(db).await;
}

#[actix_web::test]
async fn unsigned_delivery_webhooks_are_audited() {
    let db = setup().await;
    let orders = order_api(&db);
    orders.upsert_tenant(NewTenant::new("tenant_1", "Noodle Bar")).await.unwrap();
    let order = paid_fifty_dollar_order(&orders, "W-3").await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(webhook_api(&orders)))
            .service(web::scope("/webhooks").service(DeliveryWebhookRoute::<SqliteDatabase>::new()))
            .service(web::scope("/api").service(UnverifiedEventsRoute::<SqliteDatabase>::new())),
    )
    .await;

    let body = delivery_status("evt_d1", "W-3", "pickup");
    let req = test::TestRequest::post().uri("/webhooks/delivery").set_payload(body).to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(json_body(&response)["success"], true);
    let updated = orders.fetch_order(&order.id).await.unwrap();
    assert_eq!(updated.order_status, OrderStatusType::Preparing);

    let req = test::TestRequest::get().uri("/api/tenants/tenant_1/unverified_events").to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let events = json_body(&response);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_id"], "evt_d1");

    let req = test::TestRequest::get().uri("/api/tenants/tenant_2/unverified_events").to_request();
    let (_, response) = call(&app, req).await;
    assert_eq!(json_body(&response), json!([]));
    tear_down(db).await;
}

#[actix_web::test]
async fn delivery_webhooks_for_unknown_orders_are_rejected() {
    let db = setup().await;
    let orders = order_api(&db);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(webhook_api(&orders)))
            .service(web::scope("/webhooks").service(DeliveryWebhookRoute::<SqliteDatabase>::new())),
    )
    .await;
    let body = delivery_status("evt_d2", "NOPE-1", "delivered");
    let req = test::TestRequest::post()
        .uri("/webhooks/delivery")
        .insert_header((UBER_SIGNATURE_HEADER, "00ff"))
        .set_payload(body)
        .to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&response), json!({"success": false, "message": "order_not_found"}));
    tear_down(db).await;
}
