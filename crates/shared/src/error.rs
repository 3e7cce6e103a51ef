use thiserror::Error;

/// Request-level failure reported inside a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("status {status_code}: {message}")]
pub struct EnvelopeError {
    pub status_code: u16,
    pub message: String,
}

impl EnvelopeError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}
