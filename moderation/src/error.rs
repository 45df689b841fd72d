//! Error types for the moderation gate.

use thiserror::Error;

/// Result type alias for moderation operations.
pub type Result<T> = std::result::Result<T, ModerationError>;

/// Errors that can occur while consulting the moderation service.
#[derive(Error, Debug)]
pub enum ModerationError {
    /// No moderation service URL was configured.
    #[error("moderation service not configured: missing MODERATION_SERVICE_URL")]
    NotConfigured,

    /// The service answered with a failure status.
    #[error("moderation service returned error status: {status}")]
    Status { status: u16 },

    /// The service answered with a body that is not a verdict.
    #[error("invalid moderation response: {0}")]
    InvalidResponse(String),

    /// Transport failure, including timeouts.
    #[error("moderation service request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ModerationError {
    /// Whether this is a configuration problem rather than an outage.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured)
    }
}
