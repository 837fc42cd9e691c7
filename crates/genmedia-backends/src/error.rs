use thiserror::Error;

use genmedia_storage::StorageError;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Error payload returned by the remote API, message kept as sent.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("authentication failed: {0}")]
    Auth(#[from] StorageError),
    #[error("unexpected response from backend: {0}")]
    InvalidResponse(String),
    #[error("{0} backend does not support this request")]
    Unsupported(&'static str),
    #[error("no backend registered for {0} requests")]
    NotConfigured(String),
    #[error("media transform failed: {0}")]
    Transform(String),
}

impl BackendError {
    /// Build an `Api` error from a Google-style `{"error": {"message": ...}}` body.
    pub fn from_body(status: u16, body: &serde_json::Value) -> Self {
        let message = body
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        tracing::warn!(status, %message, "Backend returned an error");
        BackendError::Api { status, message }
    }
}
