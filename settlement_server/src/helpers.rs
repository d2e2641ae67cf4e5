use actix_web::HttpRequest;
use log::trace;
use settlement_engine::helpers::WebhookHeaders;

/// Copies the request headers into the engine's header map. Headers that are not valid UTF-8 cannot carry a signature
/// and are skipped.
pub fn webhook_headers(req: &HttpRequest) -> WebhookHeaders {
    req.headers()
        .iter()
        .filter_map(|(name, value)| match value.to_str() {
            Ok(v) => Some((name.as_str().to_string(), v.to_string())),
            Err(_) => {
                trace!("💻️ Skipping non-text header {name}");
                None
            },
        })
        .collect()
}
