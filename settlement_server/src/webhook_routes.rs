//! Provider webhook endpoints.
//!
//! The raw body is handed to the engine untouched, since signatures are computed over the exact bytes that were sent.
//! Providers redeliver anything that is not answered with a 2xx, so:
//! * events that were processed, replayed, ignored or found to be no-ops get a 200,
//! * bad signatures get a 401 and undecodable bodies a 400 (redelivery would not help, but the provider should know),
//! * in-flight duplicates and retryable handler failures get a 503 so that the provider tries again.
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use log::*;
use settlement_engine::{traits::SettlementDatabase, WebhookApi, WebhookError};

use crate::{data_objects::JsonResponse, errors::ServerError, helpers::webhook_headers, route};

route!(payment_webhook => Post "/payments" impl SettlementDatabase);
pub async fn payment_webhook<B: SettlementDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B>>,
) -> HttpResponse {
    trace!("💻️ Received payment webhook ({} bytes)", body.len());
    let headers = webhook_headers(&req);
    match api.handle_payment_webhook(&body, &headers).await {
        Ok(ack) => HttpResponse::Ok().json(JsonResponse::success(ack.message())),
        Err(e) => webhook_failure("payment", e),
    }
}

route!(delivery_webhook => Post "/delivery" impl SettlementDatabase);
pub async fn delivery_webhook<B: SettlementDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B>>,
) -> HttpResponse {
    trace!("💻️ Received delivery webhook ({} bytes)", body.len());
    let headers = webhook_headers(&req);
    match api.handle_delivery_webhook(&body, &headers).await {
        Ok(ack) => HttpResponse::Ok().json(JsonResponse::success(ack.message())),
        Err(e) => webhook_failure("delivery", e),
    }
}

fn webhook_failure(kind: &str, e: WebhookError) -> HttpResponse {
    let message = match &e {
        WebhookError::Unauthorized(reason) => reason.as_str().to_string(),
        _ => e.to_string(),
    };
    if e.is_retryable() {
        warn!("💻️ {kind} webhook could not be processed and will be redelivered. {e}");
    } else {
        info!("💻️ {kind} webhook rejected. {e}");
    }
    let status = ServerError::from(e).status_code();
    HttpResponse::build(status).json(JsonResponse::failure(message))
}
