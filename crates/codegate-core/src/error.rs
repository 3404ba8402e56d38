//! Error types shared across codegate.
//!
//! `ProviderError` lives here rather than in `codegate-providers` so the
//! evaluator can downcast collaborator failures and tell a transport timeout
//! apart from other faults without string matching.

use thiserror::Error;

use crate::model::Category;

/// Errors that can occur when talking to a text-generation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out at the transport level.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }
}

/// A collaborator payload that does not match the score record contract.
///
/// Variants are listed in the order the validator checks them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),

    #[error("score for {category} is not an integer in 0..=10 (found {found})")]
    OutOfRangeScore { category: Category, found: String },

    #[error("invalid verdict: {0}")]
    InvalidVerdict(String),
}

impl ValidationFailure {
    /// Stable short name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationFailure::MalformedPayload(_) => "malformed_payload",
            ValidationFailure::MissingField(_) => "missing_field",
            ValidationFailure::OutOfRangeScore { .. } => "out_of_range_score",
            ValidationFailure::InvalidVerdict(_) => "invalid_verdict",
        }
    }
}

/// A request rejected before any collaborator call is made.
///
/// Messages are stable and safe to show to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestInvalid {
    #[error("task identifier is empty")]
    MissingTaskId,

    #[error("submitted code is empty")]
    EmptyCode,

    #[error("at least one requirement is needed")]
    NoRequirements,

    #[error("submitted code is {len} characters, the limit is {max}")]
    CodeTooLarge { len: usize, max: usize },
}
