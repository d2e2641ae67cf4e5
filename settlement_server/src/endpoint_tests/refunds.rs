use actix_web::{http::StatusCode, test, web, App};
use serde_json::json;
use settle_common::Cents;
use settlement_engine::{
    db_types::PaymentStatusType,
    traits::{CaptureStatus, ExternalServiceError, ProcessorRefund},
    RefundApi,
    SqliteDatabase,
};

use super::{
    helpers::{call, json_body, order_api, paid_fifty_dollar_order, setup, tear_down},
    mocks::MockPaymentGateway,
};
use crate::routes::{PaymentStatusRoute, RefundOrderRoute};

#[actix_web::test]
async fn refunds_are_capped_at_the_remaining_balance() {
    let db = setup().await;
    let orders = order_api(&db);
    let order = paid_fifty_dollar_order(&orders, "R-1").await;
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_create_refund().times(2).returning(|req| {
        assert_eq!(req.payment_intent_id, "pi_R-1");
        Ok(ProcessorRefund {
            refund_id: format!("re_{}", req.amount.value()),
            amount: req.amount,
            status: "succeeded".into(),
        })
    });
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(RefundApi::new(orders.clone(), gateway)))
            .service(web::scope("/api").service(RefundOrderRoute::<SqliteDatabase, MockPaymentGateway>::new())),
    )
    .await;
    let uri = format!("/api/orders/{}/refund", order.id);

    let req = test::TestRequest::post().uri(&uri).set_json(json!({"amount": 30.00, "reason": "Cold"})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result = json_body(&body);
    assert_eq!(result["refund_id"], "re_3000");
    assert_eq!(result["refunded_amount"], 30.0);
    assert_eq!(result["payment_status"], "partial_refund");

    let req = test::TestRequest::post().uri(&uri).set_json(json!({"amount": 25.00})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let req = test::TestRequest::post().uri(&uri).set_json(json!({})).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post().uri(&uri).set_json(json!({"full_refund": true})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result = json_body(&body);
    assert_eq!(result["amount"], 20.0);
    assert_eq!(result["refunded_amount"], 50.0);
    assert_eq!(result["payment_status"], "refunded");

    let req = test::TestRequest::post().uri(&uri).set_json(json!({"full_refund": true})).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let after = orders.fetch_order(&order.id).await.unwrap();
    assert_eq!(after.refunded_amount, Cents::from(5_000));
    assert_eq!(after.payment_status, PaymentStatusType::Refunded);
    tear_down(db).await;
}

#[actix_web::test]
async fn processor_outages_leave_the_order_untouched() {
    let db = setup().await;
    let orders = order_api(&db);
    let order = paid_fifty_dollar_order(&orders, "R-2").await;
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_create_refund()
        .times(1)
        .returning(|_| Err(ExternalServiceError::retryable("stripe: Request timed out")));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(RefundApi::new(orders.clone(), gateway)))
            .service(web::scope("/api").service(RefundOrderRoute::<SqliteDatabase, MockPaymentGateway>::new())),
    )
    .await;
    let uri = format!("/api/orders/{}/refund", order.id);
    let req = test::TestRequest::post().uri(&uri).set_json(json!({"full_refund": true})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("timed out"));
    assert_eq!(orders.fetch_order(&order.id).await.unwrap(), order);
    tear_down(db).await;
}

#[actix_web::test]
async fn payment_status_is_looked_up_at_the_processor() {
    let db = setup().await;
    let orders = order_api(&db);
    let order = paid_fifty_dollar_order(&orders, "R-3").await;
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_fetch_payment_status().times(1).returning(|id| {
        assert_eq!(id, "pi_R-3");
        Ok(CaptureStatus {
            payment_intent_id: id.to_string(),
            status: "succeeded".into(),
            amount: Cents::from(5_000),
            amount_received: Cents::from(5_000),
            currency: "USD".into(),
        })
    });
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(RefundApi::new(orders.clone(), gateway)))
            .service(web::scope("/api").service(PaymentStatusRoute::<SqliteDatabase, MockPaymentGateway>::new())),
    )
    .await;
    let req = test::TestRequest::get().uri(&format!("/api/orders/{}/payment", order.id)).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let capture = json_body(&body);
    assert_eq!(capture["status"], "succeeded");
    assert_eq!(capture["amount_received"], 50.0);
    tear_down(db).await;
}
