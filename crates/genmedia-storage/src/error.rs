use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid storage locator '{0}', expected gs://bucket/object")]
    InvalidLocator(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("no signing credentials configured")]
    SigningUnavailable,
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("failed to obtain access token: {0}")]
    Token(String),
}
