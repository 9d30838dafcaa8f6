//! Error types for the curation engine
//!
//! Every rejection kind is its own variant so callers can tell an
//! authorization failure from a four-eyes violation from a version conflict
//! without string matching. None of them carry data the actor could not
//! already read.

use crate::scoring::EvidenceValidationError;
use gcur_common::{ScopeRole, WorkflowStage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::Capability;

/// Why an actor was denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    /// Write attempted without an authenticated user
    #[error("authentication required")]
    Anonymous,

    /// Target does not exist or is not readable; the two are indistinguishable
    #[error("not found or not visible")]
    NotVisible,

    /// No accepted, active membership in a scope whose existence is public
    #[error("no active membership in this scope")]
    NoMembership,

    /// Membership exists but its role lacks the capability
    #[error("role '{role}' lacks the '{required}' capability")]
    InsufficientRole {
        role: ScopeRole,
        required: Capability,
    },

    /// Scope is deactivated; members may still read
    #[error("scope is inactive")]
    ScopeInactive,

    /// Evidence may only change while the curation is in a curator stage
    #[error("evidence is frozen while the curation is in stage '{stage}'")]
    EvidenceFrozen { stage: WorkflowStage },

    /// Operation reserved for application administrators
    #[error("application administrator required")]
    AdminOnly,
}

/// Independent review (four-eyes) rule that was violated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ReviewViolation {
    #[error("cannot review own work")]
    SelfReview,

    #[error("insufficient distinct reviewers: {found} of {required}")]
    InsufficientReviewers { required: u32, found: u32 },
}

/// Engine error
#[derive(Debug, Error)]
pub enum CurationError {
    #[error("Unauthorized: {0}")]
    Unauthorized(DenyReason),

    /// State-graph violation; well-formed clients never trigger this
    #[error("Invalid transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: WorkflowStage,
        to: WorkflowStage,
    },

    #[error("Review policy violation: {0}")]
    ReviewPolicyViolation(ReviewViolation),

    /// Version mismatch; the caller must re-fetch and decide
    #[error("Concurrent modification: expected version {expected}, found {found}")]
    ConcurrentModification { expected: i64, found: i64 },

    #[error("Evidence validation failed: {0}")]
    EvidenceValidation(#[from] EvidenceValidationError),

    /// Missing entity inside a scope the actor can already read
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] gcur_common::Error),
}

impl From<sqlx::Error> for CurationError {
    fn from(err: sqlx::Error) -> Self {
        CurationError::Store(gcur_common::Error::Database(err))
    }
}

impl From<DenyReason> for CurationError {
    fn from(reason: DenyReason) -> Self {
        CurationError::Unauthorized(reason)
    }
}

impl From<ReviewViolation> for CurationError {
    fn from(violation: ReviewViolation) -> Self {
        CurationError::ReviewPolicyViolation(violation)
    }
}

impl CurationError {
    /// True for rejections the caller can resolve by re-fetching
    pub fn is_conflict(&self) -> bool {
        matches!(self, CurationError::ConcurrentModification { .. })
    }
}

/// Convenience Result type using the engine error
pub type Result<T> = std::result::Result<T, CurationError>;
