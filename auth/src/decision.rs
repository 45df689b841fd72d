//! Similarity-gated authentication decision.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use semauth_embeddings::cosine_similarity;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audit::{AttemptOutcome, AuditLog, AuthAttemptRecord};
use crate::error::{AuthError, Result};

/// Minimum cosine similarity for a login to pass, within `[0, 1]`.
///
/// Range checks happen when a `Threshold` is built, so the decision itself
/// never sees an invalid value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Threshold(f32);

impl Threshold {
    /// Threshold used when the caller omits one.
    pub const DEFAULT: Threshold = Threshold(0.88);

    /// Validate a threshold.
    pub fn new(value: f32) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AuthError::InvalidInput(format!(
                "threshold must be within [0, 1], got {value}"
            )))
        }
    }

    /// Resolve a caller-supplied threshold. Missing or zero means `default`.
    pub fn or_default(requested: Option<f32>, default: Threshold) -> Result<Self> {
        match requested {
            None => Ok(default),
            Some(value) if value == 0.0 => Ok(default),
            Some(value) => Self::new(value),
        }
    }

    /// The raw value.
    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f32> for Threshold {
    type Error = AuthError;

    fn try_from(value: f32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f32 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of comparing a guess against a stored embedding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Cosine similarity in `[-1, 1]`.
    pub similarity: f32,

    /// Whether `similarity >= threshold`.
    pub passed: bool,
}

/// Compare two embeddings against a threshold.
pub fn evaluate(stored: &[f32], guess: &[f32], threshold: Threshold) -> Result<Decision> {
    let similarity = cosine_similarity(stored, guess)?;
    Ok(Decision {
        similarity,
        passed: similarity >= threshold.value(),
    })
}

/// Makes decisions and records every one of them.
pub struct AuthDecision {
    audit: Arc<dyn AuditLog>,
}

impl AuthDecision {
    /// Create a decision component writing to `audit`.
    pub fn new(audit: Arc<dyn AuditLog>) -> Self {
        Self { audit }
    }

    /// Decide and record the attempt.
    ///
    /// The attempt is recorded whether the comparison passes, fails or
    /// errors. A failure to persist the record is logged and does not
    /// change the decision.
    pub async fn decide(
        &self,
        subject: &str,
        input: &str,
        stored: &[f32],
        guess: &[f32],
        threshold: Threshold,
    ) -> Result<Decision> {
        let result = evaluate(stored, guess, threshold);

        let (similarity, outcome) = match &result {
            Ok(decision) if decision.passed => (Some(decision.similarity), AttemptOutcome::Passed),
            Ok(decision) => (Some(decision.similarity), AttemptOutcome::Rejected),
            Err(_) => (None, AttemptOutcome::Error),
        };

        let record = AuthAttemptRecord {
            subject: subject.to_string(),
            input: input.to_string(),
            similarity,
            timestamp: Utc::now(),
            outcome,
        };

        if let Err(e) = self.audit.append(&record).await {
            warn!(subject, "Failed to record login attempt: {e}");
        }

        debug!(subject, ?outcome, similarity, %threshold, "Authentication decision");
        result
    }
}
