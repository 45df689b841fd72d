//! # Semantic Cache
//!
//! Client for the shared semantic cache service. The tier is optional:
//! a disabled or unreachable service behaves like a miss, and stores are
//! performed off the request path by the caller.

pub mod client;
pub mod config;

pub use client::{CacheRequest, CacheResponse, SemanticCacheClient};
pub use config::SemanticCacheConfig;
