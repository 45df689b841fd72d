//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while computing or generating embeddings.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider credential missing.
    #[error("embedding provider not configured: missing API key")]
    ProviderNotConfigured,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Vectors of different length were compared.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A zero-magnitude vector has no defined cosine.
    #[error("degenerate vector: zero magnitude")]
    DegenerateVector,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised by a cache tier.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The tier could not be reached or answered with a failure status.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The tier answered but the payload could not be decoded.
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
