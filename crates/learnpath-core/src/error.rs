//! Error types for the learning core and its collaborators.
//!
//! `LearnError` is what callers of the core see. `ProviderError` describes
//! failures of the external content source and progress sink; it lives here
//! so the engine can downcast and classify errors for retry decisions
//! without string matching.

use thiserror::Error;

/// Errors surfaced by the learning core.
///
/// None of these are fatal to the application: they are meant to be
/// recovered at the UI boundary.
#[derive(Debug, Error)]
pub enum LearnError {
    /// The quiz or card source returned nothing or failed to load.
    #[error("content unavailable for module '{module_id}': {reason}")]
    ContentUnavailable { module_id: String, reason: String },

    /// Malformed question, requirement or curriculum data.
    #[error("validation error: {0}")]
    Validation(String),

    /// The progress sink rejected or never received a completion event.
    #[error("failed to persist progress: {reason}")]
    PersistenceFailure { reason: String },

    /// An operation the current quiz, review or unlock state does not allow.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl LearnError {
    pub(crate) fn content_unavailable(module_id: &str, reason: impl Into<String>) -> Self {
        LearnError::ContentUnavailable {
            module_id: module_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur when talking to a content source or progress sink.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The service returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (missing or invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network or I/O error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProviderError::AuthenticationFailed(_) | ProviderError::NotFound(_) => true,
            ProviderError::ApiError { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
