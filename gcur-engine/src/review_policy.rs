//! Review Policy Resolver
//!
//! A scope's `WorkflowConfiguration` is data: the workflow engine asks the
//! resolved `ReviewPolicy` about a transition instead of branching on the
//! transition itself.
//!
//! # Resolution order
//! 1. Configuration for (scope, workflow pair), when the curation has a pair
//! 2. Scope-level configuration
//! 3. `ReviewPolicyConfig::default()`: review required for `review -> active`,
//!    self-review disallowed, one reviewer
//!
//! # Evaluation order
//! Rules short-circuit in this exact order; earlier rules win.
//! 1. Peer review disabled: not required
//! 2. Edge not in `review_transitions`: not required
//! 3. Classification in `skip_classifications`: not required
//! 4. Non-empty `require_classifications`: required only if listed
//! 5. Score below `skip_below_score`: not required
//! 6. Otherwise required

use crate::error::Result;
use crate::store;
use chrono::{DateTime, Utc};
use gcur_common::WorkflowStage;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

/// A directed edge of the stage graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageEdge {
    pub from: WorkflowStage,
    pub to: WorkflowStage,
}

impl StageEdge {
    pub fn new(from: WorkflowStage, to: WorkflowStage) -> Self {
        Self { from, to }
    }
}

/// Risk-based carve-outs, consulted only for gated transitions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskOverrides {
    #[serde(default)]
    pub skip_classifications: Vec<String>,
    /// When non-empty, review applies only to these classifications
    #[serde(default)]
    pub require_classifications: Vec<String>,
    #[serde(default)]
    pub skip_below_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPolicyConfig {
    pub peer_review_required: bool,
    pub allow_self_review: bool,
    pub min_reviewers: u32,
    pub review_transitions: Vec<StageEdge>,
    #[serde(default)]
    pub risk: RiskOverrides,
}

impl Default for ReviewPolicyConfig {
    fn default() -> Self {
        Self {
            peer_review_required: true,
            allow_self_review: false,
            min_reviewers: 1,
            review_transitions: vec![StageEdge::new(WorkflowStage::Review, WorkflowStage::Active)],
            risk: RiskOverrides::default(),
        }
    }
}

impl ReviewPolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.peer_review_required && self.min_reviewers == 0 {
            return Err(crate::error::CurationError::InvalidInput(
                "min_reviewers must be at least 1 when peer review is required".to_string(),
            ));
        }
        if let Some(threshold) = self.risk.skip_below_score {
            if !threshold.is_finite() {
                return Err(crate::error::CurationError::InvalidInput(
                    "skip_below_score must be a finite number".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Stored per-scope (optionally per-workflow-pair) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfiguration {
    pub scope_id: Uuid,
    /// `None` for the scope-level configuration
    pub workflow_pair: Option<String>,
    pub policy: ReviewPolicyConfig,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// Where a resolved policy came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "workflow_pair", rename_all = "snake_case")]
pub enum PolicySource {
    WorkflowPair(String),
    Scope,
    Default,
}

/// Why review was not required
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewExemption {
    PeerReviewDisabled,
    TransitionNotGated,
    ClassificationSkipped,
    ClassificationNotInRequireList,
    BelowScoreThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    NotRequired { exemption: ReviewExemption },
    Required { min_reviewers: u32, allow_self_review: bool },
}

impl ReviewDecision {
    pub fn is_required(&self) -> bool {
        matches!(self, ReviewDecision::Required { .. })
    }
}

/// Resolved policy for one (scope, workflow pair)
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPolicy {
    pub source: PolicySource,
    pub config: ReviewPolicyConfig,
}

impl ReviewPolicy {
    pub fn default_policy() -> Self {
        Self {
            source: PolicySource::Default,
            config: ReviewPolicyConfig::default(),
        }
    }

    /// Decide whether `edge` needs independent review
    pub fn evaluate(
        &self,
        edge: StageEdge,
        classification: Option<&str>,
        score: Option<f64>,
    ) -> ReviewDecision {
        let config = &self.config;
        let exempt = |exemption| ReviewDecision::NotRequired { exemption };

        if !config.peer_review_required {
            return exempt(ReviewExemption::PeerReviewDisabled);
        }
        if !config.review_transitions.contains(&edge) {
            return exempt(ReviewExemption::TransitionNotGated);
        }

        let risk = &config.risk;
        let listed = |list: &[String]| {
            classification.is_some_and(|c| list.iter().any(|l| l.eq_ignore_ascii_case(c)))
        };
        if !risk.skip_classifications.is_empty() && listed(&risk.skip_classifications) {
            return exempt(ReviewExemption::ClassificationSkipped);
        }
        if !risk.require_classifications.is_empty() {
            if !listed(&risk.require_classifications) {
                return exempt(ReviewExemption::ClassificationNotInRequireList);
            }
        } else if let (Some(threshold), Some(score)) = (risk.skip_below_score, score) {
            if score < threshold {
                return exempt(ReviewExemption::BelowScoreThreshold);
            }
        }

        ReviewDecision::Required {
            min_reviewers: config.min_reviewers.max(1),
            allow_self_review: config.allow_self_review,
        }
    }

    pub fn requires_review(
        &self,
        edge: StageEdge,
        classification: Option<&str>,
        score: Option<f64>,
    ) -> bool {
        self.evaluate(edge, classification, score).is_required()
    }

    pub fn allows_self_review(&self) -> bool {
        self.config.allow_self_review
    }

    pub fn min_reviewers(&self) -> u32 {
        self.config.min_reviewers.max(1)
    }
}

/// Store-backed resolver
///
/// Reads configuration fresh on every call; configuration is consumed here,
/// written elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewPolicyResolver;

impl ReviewPolicyResolver {
    pub async fn resolve(
        &self,
        conn: &mut SqliteConnection,
        scope_id: Uuid,
        workflow_pair: Option<&str>,
    ) -> Result<ReviewPolicy> {
        if let Some(pair) = workflow_pair {
            if let Some(config) = store::workflow_configs::load(&mut *conn, scope_id, Some(pair)).await? {
                debug!(scope_id = %scope_id, workflow_pair = pair, "Using workflow-pair review policy");
                return Ok(ReviewPolicy {
                    source: PolicySource::WorkflowPair(pair.to_string()),
                    config: config.policy,
                });
            }
        }
        if let Some(config) = store::workflow_configs::load(&mut *conn, scope_id, None).await? {
            debug!(scope_id = %scope_id, "Using scope-level review policy");
            return Ok(ReviewPolicy {
                source: PolicySource::Scope,
                config: config.policy,
            });
        }
        debug!(scope_id = %scope_id, "No workflow configuration, using default review policy");
        Ok(ReviewPolicy::default_policy())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn requires_review(
        &self,
        conn: &mut SqliteConnection,
        scope_id: Uuid,
        workflow_pair: Option<&str>,
        from: WorkflowStage,
        to: WorkflowStage,
        classification: Option<&str>,
        score: Option<f64>,
    ) -> Result<bool> {
        let policy = self.resolve(conn, scope_id, workflow_pair).await?;
        Ok(policy.requires_review(StageEdge::new(from, to), classification, score))
    }

    pub async fn allows_self_review(
        &self,
        conn: &mut SqliteConnection,
        scope_id: Uuid,
        workflow_pair: Option<&str>,
    ) -> Result<bool> {
        Ok(self.resolve(conn, scope_id, workflow_pair).await?.allows_self_review())
    }

    pub async fn min_reviewers(
        &self,
        conn: &mut SqliteConnection,
        scope_id: Uuid,
        workflow_pair: Option<&str>,
    ) -> Result<u32> {
        Ok(self.resolve(conn, scope_id, workflow_pair).await?.min_reviewers())
    }
}
