//! # Moderation
//!
//! Content moderation gate for semantic authentication. Every input is
//! approved by an external moderation service before it is embedded or
//! cached; verdicts are never cached because moderation rules change.

pub mod client;
pub mod error;

pub use client::{HealthStatus, ModerationClient, ModerationGate, ModerationVerdict};
pub use error::{ModerationError, Result};
