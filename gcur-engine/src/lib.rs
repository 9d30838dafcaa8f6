//! # Gene Curation Engine
//!
//! Multi-tenant core for gene-disease validity curation:
//! - `access`: scope-based access control evaluator
//! - `isolation`: row-level isolation for every scoped read and write
//! - `workflow`: curation stage graph and transition engine
//! - `review_policy`: per-scope independent review (four-eyes) policy
//! - `scoring`: deterministic evidence scoring engine
//! - `guard`: optimistic concurrency guard on `lock_version`
//! - `service`: `CurationService`, the facade over all of the above
//!
//! Every operation takes an explicit `Actor`; there is no ambient user.

pub mod access;
pub mod configuration;
pub mod curation;
pub mod error;
pub mod guard;
pub mod isolation;
pub mod membership;
pub mod review_policy;
pub mod scoring;
pub mod service;
pub mod workflow;

mod store;

pub use access::{Action, Capability, Decision, ReadFilter};
pub use curation::{EvidenceMutation, NewCuration};
pub use error::{CurationError, DenyReason, Result, ReviewViolation};
pub use isolation::{CurationQuery, ScopedRepository};
pub use membership::{NewScope, ScopeUpdate};
pub use review_policy::{
    ReviewDecision, ReviewPolicy, ReviewPolicyConfig, ReviewPolicyResolver, StageEdge,
    WorkflowConfiguration,
};
pub use scoring::{score_evidence, ScoreResult, ScoreState, ScoringConfig};
pub use service::CurationService;
pub use store::audit::AuditRecord;
pub use workflow::{TransitionOutcome, WorkflowEngine};
