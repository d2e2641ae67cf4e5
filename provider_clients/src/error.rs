use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("The request timed out. {0}")]
    Timeout(String),
    #[error("The provider returned a server error ({0})")]
    ServerError(u16),
    #[error("The provider rejected the request. Error {0}. {1}")]
    ClientError(u16, String),
    #[error("Could not reach the provider. {0}")]
    Network(String),
    #[error("Could not deserialize the provider's response. {0}")]
    Deserialize(String),
    #[error("The client is misconfigured. {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Timeouts, 5xx responses and network failures may succeed if the same request is sent again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ServerError(_) | Self::Network(_))
    }

    /// 429 is reported as a client error by the provider but behaves like an outage.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        if status >= 500 || status == 429 {
            Self::ServerError(status)
        } else {
            Self::ClientError(status, body)
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::Deserialize(e.to_string())
        } else if e.is_builder() {
            Self::Configuration(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_status(status.as_u16(), e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::Timeout("slow".into()).is_retryable());
        assert!(ProviderError::Network("refused".into()).is_retryable());
        assert!(ProviderError::from_status(502, String::default()).is_retryable());
        assert!(ProviderError::from_status(429, String::default()).is_retryable());
        assert!(!ProviderError::from_status(402, "card_declined".into()).is_retryable());
        assert!(!ProviderError::Deserialize("eof".into()).is_retryable());
        assert!(!ProviderError::Configuration("no key".into()).is_retryable());
    }
}
