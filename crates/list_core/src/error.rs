use std::time::Duration;

use shared::error::EnvelopeError;
use thiserror::Error;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("service error (status {status_code}): {message}")]
    Service { status_code: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Transport failures and timeouts are handled the same way.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<EnvelopeError> for GatewayError {
    fn from(value: EnvelopeError) -> Self {
        Self::Service {
            status_code: value.status_code,
            message: value.message,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Malformed(value.to_string())
        } else {
            Self::Network(value.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("list invariant violated: {0}")]
    InvariantViolation(String),
}
