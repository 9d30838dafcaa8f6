//! Curation workflow: stage graph and transition engine

pub mod engine;
pub mod graph;

pub use engine::{
    check_independent_review, ensure_evidence_editable, ensure_submittable, TransitionOutcome,
    WorkflowEngine,
};
pub use graph::{edge_kind, successors, validate_edge, EdgeKind};
