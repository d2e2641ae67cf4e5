//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the database or a provider, so none of
//! them block.
//!
//! Money in request and response bodies is in decimal dollars.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use settlement_engine::{
    db_types::OrderId,
    order_objects::{CreateOrderRequest, RefundCommand},
    traits::{DeliveryProvider, PaymentProcessor, SettlementDatabase},
    DispatchApi,
    OrderFlowApi,
    RefundApi,
    WebhookApi,
};

use crate::{
    data_objects::{DiscountRequest, OrderView, PaymentStatusView, RefundBody, StatusUpdateRequest, TenantUpdate},
    errors::ServerError,
};

/// The actor recorded in the audit log for changes made through this API.
pub const STAFF_ACTOR: &str = "staff_api";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl SettlementDatabase);
/// Prices and stores a new order. Responds with 201 and the order view, or 409 if the tenant already has an order with
/// this number.
pub async fn create_order<B: SettlementDatabase>(
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST new order {} for tenant {}", request.order_number, request.tenant_id);
    let order = api.create_order(request).await?;
    Ok(HttpResponse::Created().json(OrderView::from(order)))
}

route!(order_by_id => Get "/orders/{order_id}" impl SettlementDatabase);
pub async fn order_by_id<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ GET order {order_id}");
    let order = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(OrderView::from(order)))
}

route!(update_status => Post "/orders/{order_id}/status" impl SettlementDatabase);
/// Staff status updates. A move the transition table forbids is answered with 409 and
/// `{"error": "invalid_transition", "current": .., "requested": ..}`.
pub async fn update_status<B: SettlementDatabase>(
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let status = body.into_inner().status;
    debug!("💻️ POST status {status} for order {order_id}");
    let order = api.update_order_status(&order_id, status, STAFF_ACTOR).await?;
    Ok(HttpResponse::Ok().json(OrderView::from(order)))
}

route!(apply_discount => Post "/orders/{order_id}/discount" impl SettlementDatabase);
pub async fn apply_discount<B: SettlementDatabase>(
    path: web::Path<String>,
    body: web::Json<DiscountRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let amount = body.into_inner().amount;
    debug!("💻️ POST discount of {amount} on order {order_id}");
    let order = api.apply_discount(&order_id, amount, STAFF_ACTOR).await?;
    Ok(HttpResponse::Ok().json(OrderView::from(order)))
}

route!(refund_order => Post "/orders/{order_id}/refund" impl SettlementDatabase, PaymentProcessor);
/// Refunds `{"amount": 30.00}` or `{"full_refund": true}`. The processor is called first; nothing changes locally if
/// it fails.
pub async fn refund_order<B, P>(
    path: web::Path<String>,
    body: web::Json<RefundBody>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
{
    let order_id = OrderId::from(path.into_inner());
    let command = RefundCommand::try_from(body.into_inner())?;
    debug!("💻️ POST refund {:?} on order {order_id}", command.amount);
    let result = api.refund(&order_id, command).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(payment_status => Get "/orders/{order_id}/payment" impl SettlementDatabase, PaymentProcessor);
pub async fn payment_status<B, P>(
    path: web::Path<String>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
{
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ GET payment status for order {order_id}");
    let status = api.payment_status(&order_id).await?;
    Ok(HttpResponse::Ok().json(PaymentStatusView::from(status)))
}

route!(dispatch_order => Post "/orders/{order_id}/dispatch" impl SettlementDatabase, DeliveryProvider);
pub async fn dispatch_order<B, D>(
    path: web::Path<String>,
    api: web::Data<DispatchApi<B, D>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    D: DeliveryProvider,
{
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ POST dispatch for order {order_id}");
    let order = api.dispatch(&order_id).await?;
    Ok(HttpResponse::Ok().json(OrderView::from(order)))
}

//----------------------------------------------   Tenants  ----------------------------------------------------
route!(upsert_tenant => Put "/tenants/{tenant_id}" impl SettlementDatabase);
pub async fn upsert_tenant<B: SettlementDatabase>(
    path: web::Path<String>,
    body: web::Json<TenantUpdate>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let tenant_id = path.into_inner();
    info!("💻️ PUT settlement configuration for tenant {tenant_id}");
    let tenant = body.into_inner().into_new_tenant(&tenant_id)?;
    let tenant = api.upsert_tenant(tenant).await?;
    Ok(HttpResponse::Ok().json(tenant))
}

route!(unverified_events => Get "/tenants/{tenant_id}/unverified_events" impl SettlementDatabase);
/// Webhook events that were processed for this tenant without a verified signature.
pub async fn unverified_events<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<WebhookApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let tenant_id = path.into_inner();
    trace!("💻️ GET unverified events for tenant {tenant_id}");
    let events = api.unverified_events(&tenant_id).await?;
    Ok(HttpResponse::Ok().json(events))
}
