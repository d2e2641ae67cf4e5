use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use serde_json::json;
use settlement_engine::{OrderFlowError, WebhookError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
    #[error("{0}")]
    Webhook(#[from] WebhookError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::OrderFlow(e) => order_flow_status(e),
            Self::Webhook(e) => webhook_status(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::OrderFlow(OrderFlowError::InvalidTransition { current, requested }) => {
                json!({ "error": "invalid_transition", "current": current, "requested": requested })
            },
            Self::Webhook(WebhookError::Unauthorized(reason)) => json!({ "error": reason.as_str() }),
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

fn order_flow_status(e: &OrderFlowError) -> StatusCode {
    match e {
        OrderFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderFlowError::Validation(_) => StatusCode::BAD_REQUEST,
        OrderFlowError::RefundExceedsBalance { .. } => StatusCode::BAD_REQUEST,
        OrderFlowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        OrderFlowError::OrderAlreadyExists(_) => StatusCode::CONFLICT,
        OrderFlowError::DiscountNotAllowed(_) => StatusCode::CONFLICT,
        OrderFlowError::NothingToRefund(_) => StatusCode::CONFLICT,
        OrderFlowError::DuplicateRefund(_) => StatusCode::CONFLICT,
        OrderFlowError::ConcurrentModification(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrderFlowError::ExternalServiceError { retryable: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
        OrderFlowError::ExternalServiceError { retryable: false, .. } => StatusCode::BAD_GATEWAY,
        OrderFlowError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Anything but a 2xx makes the provider redeliver, so only retryable failures get a 5xx.
fn webhook_status(e: &WebhookError) -> StatusCode {
    match e {
        WebhookError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        WebhookError::EventInFlight(_) => StatusCode::SERVICE_UNAVAILABLE,
        WebhookError::HandlerFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        WebhookError::Ledger(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
