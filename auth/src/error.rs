//! Error types for semantic authentication.

use semauth_embeddings::{CacheError, EmbeddingError};
use semauth_moderation::ModerationError;
use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while resolving embeddings or authenticating.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The moderation service rejected the input.
    #[error("content rejected: {message}")]
    ContentRejected { message: String },

    /// The moderation service could not produce a verdict.
    #[error("moderation unavailable: {0}")]
    ModerationUnavailable(#[source] ModerationError),

    /// An authoritative store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The embedding provider failed at runtime.
    #[error("embedding provider failed: {0}")]
    Provider(#[source] EmbeddingError),

    /// A required setting is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The governing request was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Stored and guessed vectors have different dimensions.
    #[error("vector length mismatch: stored {stored}, guess {guess}")]
    VectorLengthMismatch { stored: usize, guess: usize },

    /// A zero-magnitude vector was compared.
    #[error("degenerate vector: zero magnitude")]
    DegenerateVector,

    /// Caller supplied unusable input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A user with this name is already registered.
    #[error("user already exists: {0}")]
    UserExists(String),

    /// No user with this name is registered.
    #[error("user not found: {0}")]
    UserNotFound(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Cache tier failure.
    #[error("cache tier failed: {0}")]
    Cache(#[from] CacheError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// User-visible category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected by content policy.
    Rejected,
    /// A backing service is temporarily unavailable.
    Unavailable,
    /// Stored data failed an integrity check.
    Internal,
    /// The deployment is misconfigured.
    Config,
    /// The request was cancelled.
    Cancelled,
    /// The request itself is malformed.
    InvalidInput,
    /// The resource already exists.
    Conflict,
    /// The resource does not exist.
    NotFound,
}

impl AuthError {
    /// Categorize this error for the caller.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ContentRejected { .. } => FailureKind::Rejected,
            Self::ModerationUnavailable(_) | Self::Storage(_) | Self::Provider(_) => {
                FailureKind::Unavailable
            }
            Self::Config(_) => FailureKind::Config,
            Self::Cancelled => FailureKind::Cancelled,
            Self::VectorLengthMismatch { .. } | Self::DegenerateVector => FailureKind::Internal,
            Self::InvalidInput(_) => FailureKind::InvalidInput,
            Self::UserExists(_) => FailureKind::Conflict,
            Self::UserNotFound(_) => FailureKind::NotFound,
        }
    }
}

impl From<ModerationError> for AuthError {
    fn from(err: ModerationError) -> Self {
        if err.is_configuration() {
            Self::Config(err.to_string())
        } else {
            Self::ModerationUnavailable(err)
        }
    }
}

impl From<EmbeddingError> for AuthError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::ProviderNotConfigured => Self::Config(err.to_string()),
            EmbeddingError::DimensionMismatch { expected, actual } => Self::VectorLengthMismatch {
                stored: expected,
                guess: actual,
            },
            EmbeddingError::DegenerateVector => Self::DegenerateVector,
            other => Self::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_policy_and_outage_are_distinct() {
        let rejected = AuthError::ContentRejected {
            message: "no".to_string(),
        };
        let outage = AuthError::from(ModerationError::Status { status: 503 });

        assert_eq!(rejected.kind(), FailureKind::Rejected);
        assert_eq!(outage.kind(), FailureKind::Unavailable);
    }

    #[test]
    fn test_missing_credentials_are_configuration_errors() {
        assert_eq!(
            AuthError::from(ModerationError::NotConfigured).kind(),
            FailureKind::Config
        );
        assert_eq!(
            AuthError::from(EmbeddingError::ProviderNotConfigured).kind(),
            FailureKind::Config
        );
    }

    #[test]
    fn test_similarity_errors_map_to_integrity_guards() {
        let err = AuthError::from(EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 2,
        });
        assert!(matches!(
            err,
            AuthError::VectorLengthMismatch { stored: 3, guess: 2 }
        ));
        assert_eq!(
            AuthError::from(EmbeddingError::DegenerateVector).kind(),
            FailureKind::Internal
        );
    }

    #[test]
    fn test_provider_runtime_failure_is_unavailable() {
        let err = AuthError::from(EmbeddingError::InvalidResponse("empty".to_string()));
        assert!(matches!(err, AuthError::Provider(_)));
        assert_eq!(err.kind(), FailureKind::Unavailable);
    }
}
