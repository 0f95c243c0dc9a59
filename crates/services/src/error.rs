//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use vocab_core::model::ItemId;

/// Errors emitted by remote gateway implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// No authenticated user, or the remote rejected the credentials.
    /// Surfaced immediately; never retried by background triggers.
    #[error("authentication required")]
    AuthRequired,

    /// The request exceeded its bounded timeout.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure. Transient; the next scheduled trigger
    /// retries.
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered with a non-success status.
    #[error("remote returned status {0}")]
    Http(reqwest::StatusCode),

    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode remote payload: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether a later attempt can reasonably be expected to succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Network(_) => true,
            GatewayError::Http(status) => status.is_server_error(),
            GatewayError::AuthRequired | GatewayError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the session controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("a review session is already active")]
    AlreadyActive,

    #[error("no active review session")]
    NotActive,

    #[error("session already completed")]
    Completed,

    #[error("assessment targets item {submitted}, but item {current} is being presented")]
    WrongItem { submitted: ItemId, current: ItemId },

    #[error("failed to load due items: {0}")]
    Load(#[source] GatewayError),

    #[error(transparent)]
    Review(#[from] ReviewServiceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Whether the caller may retry the same call and expect progress.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Load(err) => err.is_transient(),
            SessionError::Review(ReviewServiceError::Storage(_)) | SessionError::Storage(_) => true,
            _ => false,
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
