//! Curation stage graph
//!
//! ```text
//! entry -> precuration -> curation -> review -> active
//!   ^          |  ^                      |  |
//!   +----------+  +----------------------+  |   (review rejections)
//!              ^----------------------------+
//! ```
//!
//! `active` is terminal.

use crate::access::Action;
use crate::error::{CurationError, Result};
use crate::review_policy::StageEdge;
use gcur_common::WorkflowStage;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Kind of an allowed edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Forward move between curator stages
    Advance,
    /// Curator moves back from precuration to entry
    Revert,
    /// curation -> review
    Submit,
    /// review -> active
    Finalize,
    /// review back to an editable stage
    Reject,
}

impl EdgeKind {
    /// Action the evaluator must allow for this edge
    pub fn action(&self) -> Action {
        match self {
            EdgeKind::Advance | EdgeKind::Revert | EdgeKind::Submit => Action::AdvanceStage,
            EdgeKind::Finalize | EdgeKind::Reject => Action::ReviewStage,
        }
    }
}

/// Classify an edge, `None` when it is not in the graph
pub fn edge_kind(from: WorkflowStage, to: WorkflowStage) -> Option<EdgeKind> {
    use gcur_common::WorkflowStage::*;
    match (from, to) {
        (Entry, Precuration) | (Precuration, Curation) => Some(EdgeKind::Advance),
        (Precuration, Entry) => Some(EdgeKind::Revert),
        (Curation, Review) => Some(EdgeKind::Submit),
        (Review, Active) => Some(EdgeKind::Finalize),
        (Review, Curation) | (Review, Precuration) => Some(EdgeKind::Reject),
        _ => None,
    }
}

/// Verify `(from, to)` is an edge of the graph
///
/// A failure here means the client sent a transition the graph does not
/// contain; it is logged as an error.
pub fn validate_edge(from: WorkflowStage, to: WorkflowStage) -> Result<EdgeKind> {
    edge_kind(from, to).ok_or_else(|| {
        error!(from = %from, to = %to, "Invalid workflow transition requested");
        CurationError::InvalidTransition { from, to }
    })
}

/// All edges leaving `from`
pub fn successors(from: WorkflowStage) -> Vec<StageEdge> {
    [
        WorkflowStage::Entry,
        WorkflowStage::Precuration,
        WorkflowStage::Curation,
        WorkflowStage::Review,
        WorkflowStage::Active,
    ]
    .into_iter()
    .filter(|to| edge_kind(from, *to).is_some())
    .map(|to| StageEdge::new(from, to))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcur_common::WorkflowStage::*;

    #[test]
    fn test_forward_path() {
        assert_eq!(edge_kind(Entry, Precuration), Some(EdgeKind::Advance));
        assert_eq!(edge_kind(Precuration, Curation), Some(EdgeKind::Advance));
        assert_eq!(edge_kind(Curation, Review), Some(EdgeKind::Submit));
        assert_eq!(edge_kind(Review, Active), Some(EdgeKind::Finalize));
    }

    #[test]
    fn test_rejection_edges() {
        assert_eq!(edge_kind(Review, Curation), Some(EdgeKind::Reject));
        assert_eq!(edge_kind(Review, Precuration), Some(EdgeKind::Reject));
        assert_eq!(edge_kind(Precuration, Entry), Some(EdgeKind::Revert));
    }

    #[test]
    fn test_invalid_edges() {
        for (from, to) in [
            (Entry, Review),
            (Entry, Active),
            (Curation, Active),
            (Active, Review),
            (Active, Entry),
            (Review, Entry),
            (Review, Review),
        ] {
            assert!(matches!(
                validate_edge(from, to),
                Err(CurationError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_active_is_terminal() {
        assert!(successors(Active).is_empty());
        assert_eq!(successors(Review).len(), 3);
    }

    #[test]
    fn test_edge_actions() {
        assert_eq!(EdgeKind::Submit.action(), Action::AdvanceStage);
        assert_eq!(EdgeKind::Finalize.action(), Action::ReviewStage);
        assert_eq!(EdgeKind::Reject.action(), Action::ReviewStage);
    }
}
