//! # Embeddings
//!
//! This crate provides the embedding building blocks for semantic
//! authentication: canonical text, content hashing, similarity, the
//! external embedding provider and the cache tiers that sit in front of it.
//!
//! ## Features
//!
//! - **Canonical Text**: Trimmed, lower-cased input shared by every stage
//! - **Similarity**: Exact pairwise cosine similarity with integrity guards
//! - **Providers**: OpenAI-compatible embedding generation
//! - **Cache Tiers**: One capability interface for best-effort and
//!   authoritative caches
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  NormalizedText ──► CacheKey ──► CacheTier (try_get / put)      │
//! │       │                              │                          │
//! │       ▼                              ▼                          │
//! │  EmbeddingProvider ──► Embedding ──► cosine_similarity          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod persist;
pub mod provider;
pub mod similarity;
pub mod text;

pub use cache::{CacheKey, CacheRecord, CacheTier, FileCache, MemoryCache, TierPolicy};
pub use error::{CacheError, EmbeddingError, Result};
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use similarity::cosine_similarity;
pub use text::{ContentHash, NormalizedText};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (varies by model).
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
