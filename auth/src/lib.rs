//! # Semantic Authentication
//!
//! This crate resolves text to embeddings through a moderated, tiered cache
//! and authenticates users by comparing password embeddings:
//!
//! - **Resolver**: Moderation, ordered cache tiers and provider fallback
//! - **Write-back**: Bounded background population of best-effort tiers
//! - **Decision**: Threshold comparison with an audit trail
//! - **Service**: Registration, login and attempt reports
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Authenticator                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  UserStore   │  │  Embedding   │  │ AuthDecision │           │
//! │  │              │  │   Resolver   │  │  + AuditLog  │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │                           │                                     │
//! │         ┌─────────────────┼─────────────────┐                   │
//! │         ▼                 ▼                 ▼                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Moderation  │  │ Cache Tiers  │  │   Provider   │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │                           ▲                                     │
//! │                           │                                     │
//! │                   ┌──────────────┐                              │
//! │                   │  Write-back  │                              │
//! │                   └──────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use semauth_auth::{AuthConfig, Authenticator};
//!
//! let auth = Authenticator::open(&AuthConfig::from_env()?).await?;
//! auth.register("alice", "Secret1").await?;
//!
//! let outcome = auth.login("alice", "secret1", None).await?;
//! assert!(outcome.passed);
//! ```

pub mod audit;
pub mod config;
pub mod decision;
pub mod error;
pub mod resolver;
pub mod service;
pub mod users;
pub mod writeback;

pub use audit::{AttemptOutcome, AuditLog, AuthAttemptRecord, FileAuditLog, MemoryAuditLog};
pub use config::AuthConfig;
pub use decision::{AuthDecision, Decision, Threshold, evaluate};
pub use error::{AuthError, FailureKind, Result, StorageError};
pub use resolver::{EmbeddingResolver, ServiceStatus};
pub use service::{AttemptSummary, Authenticator, LoginOutcome, REPORT_LIMIT};
pub use users::{FileUserStore, MemoryUserStore, UserRecord, UserStore};
pub use writeback::{ShutdownMode, WriteBackJob, WriteBackQueue};
