use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use settle_common::Cents;
use settlement_engine::{
    db_types::OrderId,
    traits::{DeliveryHandle, DeliveryQuote},
    DispatchApi,
    SqliteDatabase,
};

use super::{
    helpers::{call, json_body, order_api, setup, tear_down},
    mocks::MockCourier,
};
use crate::routes::{
    ApplyDiscountRoute,
    CreateOrderRoute,
    DispatchOrderRoute,
    OrderByIdRoute,
    UpdateStatusRoute,
    UpsertTenantRoute,
};

fn cents(value: &Value) -> i64 {
    (value.as_f64().expect("Expected a number") * 100.0).round() as i64
}

fn pickup_order(number: &str) -> Value {
    json!({
        "tenant_id": "tenant_1",
        "order_number": number,
        "order_type": "pickup",
        "subtotal": 100.00,
        "tax_rate": 10.25
    })
}

#[actix_web::test]
async fn create_and_fetch_an_order() {
    let db = setup().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(order_api(&db)))
            .service(
                web::scope("/api")
                    .service(CreateOrderRoute::<SqliteDatabase>::new())
                    .service(OrderByIdRoute::<SqliteDatabase>::new()),
            ),
    )
    .await;

    let req = test::TestRequest::post().uri("/api/orders").set_json(pickup_order("A-1")).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order = json_body(&body);
    assert_eq!(cents(&order["tax"]), 1_025);
    assert_eq!(cents(&order["processor_fee"]), 350);
    assert_eq!(cents(&order["total"]), 11_375);
    assert_eq!(order["order_status"], "pending");
    assert_eq!(order["payment_status"], "pending");
    let order_id = order["order_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri(&format!("/api/orders/{order_id}")).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let fetched = json_body(&body);
    assert_eq!(fetched["order_id"], order["order_id"]);
    assert_eq!(fetched["order_number"], "A-1");
    assert_eq!(cents(&fetched["total"]), 11_375);

    let req = test::TestRequest::get().uri("/api/orders/ord_missing").to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = test::TestRequest::post().uri("/api/orders").set_json(pickup_order("A-1")).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("A-1"));

    let mut absurd = pickup_order("A-2");
    absurd["subtotal"] = json!(92_233_720_368_547_758.0);
    let req = test::TestRequest::post().uri("/api/orders").set_json(absurd).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    tear_down(db).await;
}

#[actix_web::test]
async fn status_updates_follow_the_transition_table() {
    let db = setup().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(order_api(&db)))
            .service(
                web::scope("/api")
                    .service(CreateOrderRoute::<SqliteDatabase>::new())
                    .service(UpdateStatusRoute::<SqliteDatabase>::new()),
            ),
    )
    .await;
    let req = test::TestRequest::post().uri("/api/orders").set_json(pickup_order("S-1")).to_request();
    let (_, body) = call(&app, req).await;
    let order_id = json_body(&body)["order_id"].as_str().unwrap().to_string();
    let uri = format!("/api/orders/{order_id}/status");

    let req = test::TestRequest::post().uri(&uri).set_json(json!({"status": "confirmed"})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json_body(&body)["order_status"], "confirmed");

    let req = test::TestRequest::post().uri(&uri).set_json(json!({"status": "cancelled"})).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::post().uri(&uri).set_json(json!({"status": "confirmed"})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let expected = json!({"error": "invalid_transition", "current": "cancelled", "requested": "confirmed"});
    assert_eq!(json_body(&body), expected);

    let req = test::TestRequest::post().uri(&uri).set_json(json!({"status": "shipped"})).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = order_api(&db).fetch_order(&OrderId::from(order_id)).await.unwrap();
    assert_eq!(stored.order_status.as_str(), "cancelled");
    tear_down(db).await;
}

#[actix_web::test]
async fn discounts_recompute_fees_until_payment() {
    let db = setup().await;
    let orders = order_api(&db);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(orders.clone()))
            .service(
                web::scope("/api")
                    .service(CreateOrderRoute::<SqliteDatabase>::new())
                    .service(ApplyDiscountRoute::<SqliteDatabase>::new()),
            ),
    )
    .await;
    let mut request = pickup_order("G-1");
    request["payment_intent_id"] = json!("pi_G-1");
    let req = test::TestRequest::post().uri("/api/orders").set_json(request).to_request();
    let (_, body) = call(&app, req).await;
    let order_id = json_body(&body)["order_id"].as_str().unwrap().to_string();
    let uri = format!("/api/orders/{order_id}/discount");

    let req = test::TestRequest::post().uri(&uri).set_json(json!({"amount": 20.00})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = json_body(&body);
    assert_eq!(cents(&order["discount"]), 2_000);
    assert_eq!(cents(&order["processor_fee"]), 292);
    assert_eq!(cents(&order["total"]), 9_317);

    orders.mark_paid(&OrderId::from(order_id), "pi_G-1", "test").await.unwrap();
    let req = test::TestRequest::post().uri(&uri).set_json(json!({"amount": 5.00})).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    tear_down(db).await;
}

#[actix_web::test]
async fn paid_delivery_orders_are_dispatched_once() {
    let db = setup().await;
    let orders = order_api(&db);
    let mut courier = MockCourier::new();
    courier.expect_quote().times(1).returning(|req| {
        assert_eq!(req.order_number, "D-1");
        assert_eq!(req.external_id, req.order_id.as_str());
        assert_eq!(req.pickup_address, "1 Main St");
        Ok(DeliveryQuote {
            quote_id: "dqt_1".into(),
            fee: Cents::from(499),
            currency: "USD".into(),
            expires_at: None,
            dropoff_eta: None,
        })
    });
    courier.expect_accept().times(1).returning(|quote, _| {
        assert_eq!(quote.quote_id, "dqt_1");
        Ok(DeliveryHandle {
            delivery_id: "del_1".into(),
            status: "pending".into(),
            fee: Cents::from(499),
            tracking_url: None,
        })
    });
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(orders.clone()))
            .app_data(web::Data::new(DispatchApi::new(orders.clone(), courier)))
            .service(
                web::scope("/api")
                    .service(UpsertTenantRoute::<SqliteDatabase>::new())
                    .service(CreateOrderRoute::<SqliteDatabase>::new())
                    .service(DispatchOrderRoute::<SqliteDatabase, MockCourier>::new()),
            ),
    )
    .await;

    let tenant = json!({
        "name": "Noodle Bar",
        "merchant_fee": 1.00,
        "pickup_address": "1 Main St",
        "pickup_phone": "+15550001"
    });
    let req = test::TestRequest::put().uri("/api/tenants/tenant_1").set_json(tenant).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(json_body(&body).get("delivery_webhook_secret").is_none());

    let order = json!({
        "tenant_id": "tenant_1",
        "order_number": "D-1",
        "order_type": "delivery",
        "subtotal": 100.00,
        "tax_rate": 10.25,
        "delivery_fee": 4.99,
        "tip": 5.00,
        "payment_intent_id": "pi_D-1",
        "customer_name": "Alice",
        "customer_phone": "+15550002",
        "delivery_address": "2 Side St"
    });
    let req = test::TestRequest::post().uri("/api/orders").set_json(order).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order = json_body(&body);
    assert_eq!(cents(&order["total"]), 12_506);
    let order_id = OrderId::from(order["order_id"].as_str().unwrap());
    let uri = format!("/api/orders/{order_id}/dispatch");

    let req = test::TestRequest::post().uri(&uri).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT, "Unpaid orders cannot be dispatched");

    orders.mark_paid(&order_id, "pi_D-1", "test").await.unwrap();
    for _ in 0..2 {
        let req = test::TestRequest::post().uri(&uri).to_request();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(json_body(&body)["delivery_id"], "del_1");
    }
    tear_down(db).await;
}
