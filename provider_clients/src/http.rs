use log::*;
use reqwest::{header::HeaderMap, Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::{HttpTimeouts, ProviderError};

pub fn build_client(timeouts: HttpTimeouts, headers: HeaderMap) -> Result<Client, ProviderError> {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.total)
        .default_headers(headers)
        .build()
        .map_err(|e| ProviderError::Configuration(e.to_string()))
}

/// Sends the request and decodes a successful JSON response. Non-2xx responses are classified by status code.
pub async fn send_json<T: DeserializeOwned>(provider: &str, request: RequestBuilder) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| {
        warn!("{provider} request failed. {e}");
        ProviderError::from(e)
    })?;
    let status = response.status();
    if status.is_success() {
        trace!("{provider} request succeeded. {status}");
        let body = response.bytes().await?;
        return serde_json::from_slice(&body).map_err(|e| ProviderError::Deserialize(e.to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    warn!("{provider} responded with {status}. {body}");
    Err(ProviderError::from_status(status.as_u16(), body))
}

pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}
