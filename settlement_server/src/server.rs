use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use settlement_engine::{events::EventProducers, DispatchApi, OrderFlowApi, RefundApi, SqliteDatabase, WebhookApi};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    hooks::create_notification_handlers,
    integrations::{StripeProcessor, UberDelivery},
    retention_worker::start_retention_worker,
    routes::{
        health,
        ApplyDiscountRoute,
        CreateOrderRoute,
        DispatchOrderRoute,
        OrderByIdRoute,
        PaymentStatusRoute,
        RefundOrderRoute,
        UnverifiedEventsRoute,
        UpdateStatusRoute,
        UpsertTenantRoute,
    },
    webhook_routes::{DeliveryWebhookRoute, PaymentWebhookRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_notification_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let orders = OrderFlowApi::new(db.clone(), config.engine.fees.clone(), producers.clone());
    let webhooks = WebhookApi::new(orders, config.engine.webhooks.clone(), config.engine.ledger);
    let _retention = start_retention_worker(webhooks.processor().clone(), config.retention_check_interval);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::BackendError(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let processor =
        StripeProcessor::new(config.stripe.clone()).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let courier = UberDelivery::new(config.uber.clone()).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let engine = config.engine.clone();
    info!("💻️ Binding to {}:{}", config.host, config.port);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), engine.fees.clone(), producers.clone());
        let refund_api = RefundApi::new(orders_api.clone(), processor.clone());
        let dispatch_api = DispatchApi::new(orders_api.clone(), courier.clone());
        let webhook_api = WebhookApi::new(orders_api.clone(), engine.webhooks.clone(), engine.ledger);
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(UpdateStatusRoute::<SqliteDatabase>::new())
            .service(ApplyDiscountRoute::<SqliteDatabase>::new())
            .service(RefundOrderRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(DispatchOrderRoute::<SqliteDatabase, UberDelivery>::new())
            .service(UpsertTenantRoute::<SqliteDatabase>::new())
            .service(UnverifiedEventsRoute::<SqliteDatabase>::new());
        let webhook_scope = web::scope("/webhooks")
            .service(PaymentWebhookRoute::<SqliteDatabase>::new())
            .service(DeliveryWebhookRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("settle::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(refund_api))
            .app_data(web::Data::new(dispatch_api))
            .app_data(web::Data::new(webhook_api))
            .service(health)
            .service(api_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
