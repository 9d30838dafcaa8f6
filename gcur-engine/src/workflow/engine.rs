//! Workflow Engine
//!
//! `request_transition` is the single mutation entry point for stage
//! changes:
//! 1. Read the curation through the isolation layer
//! 2. Verify the edge exists in the stage graph
//! 3. Authorize the edge's action
//! 4. Resolve the review policy and evaluate it for this edge
//! 5. Enforce the four-eyes rules when review is required
//! 6. Under the concurrency guard: set stage, freeze or unfreeze evidence,
//!    supersede older active curations on finalize, write audit rows

use super::graph::{validate_edge, EdgeKind};
use crate::access::{authorize_in_store, Action};
use crate::error::{CurationError, DenyReason, Result, ReviewViolation};
use crate::guard;
use crate::isolation::ScopedRepository;
use crate::review_policy::{ReviewDecision, ReviewPolicyResolver, StageEdge};
use crate::scoring::EvidenceValidationError;
use crate::store;
use gcur_common::events::AuditEvent;
use gcur_common::models::ScoreStatus;
use gcur_common::{Actor, Curation, WorkflowStage};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Successful transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub curation_id: Uuid,
    pub from: WorkflowStage,
    pub to: WorkflowStage,
    pub kind: EdgeKind,
    pub new_version: i64,
    pub review: ReviewDecision,
    /// Distinct reviewers counted toward the requirement
    pub reviewers: Vec<Uuid>,
    /// Curations that lost `is_current` because this one became active
    pub superseded: Vec<Uuid>,
}

/// Four-eyes check for one transition
///
/// Counts the distinct approvers of the current review round plus the acting
/// reviewer. The creator never counts unless self-review is allowed.
pub fn check_independent_review(
    decision: &ReviewDecision,
    creator_id: Uuid,
    actor_id: Uuid,
    approvals: &[Uuid],
) -> std::result::Result<Vec<Uuid>, ReviewViolation> {
    let ReviewDecision::Required {
        min_reviewers,
        allow_self_review,
    } = *decision
    else {
        return Ok(Vec::new());
    };

    if actor_id == creator_id && !allow_self_review {
        return Err(ReviewViolation::SelfReview);
    }

    let mut reviewers: Vec<Uuid> = Vec::with_capacity(approvals.len() + 1);
    for id in approvals.iter().copied().chain(std::iter::once(actor_id)) {
        if (allow_self_review || id != creator_id) && !reviewers.contains(&id) {
            reviewers.push(id);
        }
    }

    let found = reviewers.len() as u32;
    if found < min_reviewers {
        return Err(ReviewViolation::InsufficientReviewers {
            required: min_reviewers,
            found,
        });
    }
    Ok(reviewers)
}

/// Submission gate: the evidence set must be complete and scored
pub fn ensure_submittable(curation: &Curation) -> Result<()> {
    match curation.score_status {
        ScoreStatus::Scored => Ok(()),
        ScoreStatus::Pending => Err(EvidenceValidationError::no_evidence().into()),
        ScoreStatus::Incomplete => {
            let error = curation
                .score_detail
                .clone()
                .and_then(|detail| serde_json::from_value::<EvidenceValidationError>(detail).ok())
                .unwrap_or_else(EvidenceValidationError::no_evidence);
            Err(error.into())
        }
    }
}

/// Evidence edits are only allowed while the curation is in a curator stage
pub fn ensure_evidence_editable(curation: &Curation) -> std::result::Result<(), DenyReason> {
    if curation.evidence_frozen || !curation.stage.is_editable() {
        Err(DenyReason::EvidenceFrozen {
            stage: curation.stage,
        })
    } else {
        Ok(())
    }
}

/// Sign-offs of the current round whose reviewers still hold the review
/// capability in the scope
///
/// A reviewer whose membership was deactivated after signing off no longer
/// counts toward the requirement.
async fn standing_approvals(conn: &mut SqliteConnection, curation: &Curation) -> Result<Vec<Uuid>> {
    let signed = store::approvals::reviewers(&mut *conn, curation.id, curation.review_round).await?;
    let mut standing = Vec::with_capacity(signed.len());
    for reviewer_id in signed {
        let Some(user) = store::users::load(&mut *conn, reviewer_id).await? else {
            continue;
        };
        let decision =
            authorize_in_store(&mut *conn, &user.actor(), curation.scope_id, Action::ReviewStage).await?;
        if decision.is_allowed() {
            standing.push(reviewer_id);
        } else {
            debug!(
                curation_id = %curation.id,
                reviewer_id = %reviewer_id,
                decision = ?decision,
                "Sign-off not counted, reviewer no longer authorized"
            );
        }
    }
    Ok(standing)
}

fn acting_user(actor: &Actor) -> Result<Uuid> {
    actor
        .user_id()
        .ok_or(CurationError::Unauthorized(DenyReason::Anonymous))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowEngine {
    resolver: ReviewPolicyResolver,
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// `RequestTransition(curation_id, to, actor, expected_version)`
    ///
    /// Returns the outcome and the audit events committed with it.
    pub async fn request_transition(
        &self,
        conn: &mut SqliteConnection,
        actor: &Actor,
        curation_id: Uuid,
        to: WorkflowStage,
        expected_version: i64,
    ) -> Result<(TransitionOutcome, Vec<AuditEvent>)> {
        let repo = ScopedRepository::new(actor);
        let curation = repo.curation(&mut *conn, curation_id).await?;
        let from = curation.stage;

        let kind = validate_edge(from, to)?;
        repo.authorize(&mut *conn, curation.scope_id, kind.action()).await?;
        let actor_id = acting_user(actor)?;
        guard::check_version(expected_version, curation.lock_version)?;

        if kind == EdgeKind::Submit {
            ensure_submittable(&curation)?;
        }

        let edge = StageEdge::new(from, to);
        let policy = self
            .resolver
            .resolve(&mut *conn, curation.scope_id, curation.workflow_pair.as_deref())
            .await?;
        let review = policy.evaluate(edge, curation.classification.as_deref(), curation.score);

        let approvals = if review.is_required() {
            standing_approvals(&mut *conn, &curation).await?
        } else {
            Vec::new()
        };
        let reviewers = check_independent_review(&review, curation.creator_id, actor_id, &approvals)
            .map_err(|violation| {
                info!(
                    curation_id = %curation_id,
                    actor = %actor,
                    from = %from,
                    to = %to,
                    violation = %violation,
                    "Transition rejected by review policy"
                );
                CurationError::ReviewPolicyViolation(violation)
            })?;

        let evidence_frozen = !to.is_editable();
        let review_round = if to == WorkflowStage::Review {
            curation.review_round + 1
        } else {
            curation.review_round
        };
        let scope_id = curation.scope_id;
        let gene_id = curation.gene_id.clone();
        let counted = reviewers.clone();

        let applied = guard::apply(conn, curation_id, expected_version, move |tx, new_version| {
            Box::pin(async move {
                store::curations::set_stage(&mut *tx, curation_id, to, evidence_frozen, review_round)
                    .await?;

                let now = gcur_common::time::now();
                let mut events = vec![AuditEvent::StageTransitioned {
                    curation_id,
                    scope_id,
                    from,
                    to,
                    actor_id,
                    lock_version: new_version,
                    reviewers: counted,
                    timestamp: now,
                }];

                let superseded = if kind == EdgeKind::Finalize {
                    store::curations::supersede_current(&mut *tx, scope_id, &gene_id, curation_id)
                        .await?
                } else {
                    Vec::new()
                };
                for old in &superseded {
                    events.push(AuditEvent::CurationSuperseded {
                        curation_id: *old,
                        scope_id,
                        superseded_by: curation_id,
                        actor_id,
                        timestamp: now,
                    });
                }

                for event in &events {
                    store::audit::insert(&mut *tx, event, Some(actor_id)).await?;
                }
                Ok::<_, CurationError>((events, superseded))
            })
        })
        .await?;

        let (events, superseded) = applied.value;
        info!(
            curation_id = %curation_id,
            actor = %actor,
            from = %from,
            to = %to,
            lock_version = applied.new_version,
            "Stage transition committed"
        );

        Ok((
            TransitionOutcome {
                curation_id,
                from,
                to,
                kind,
                new_version: applied.new_version,
                review,
                reviewers,
                superseded,
            },
            events,
        ))
    }

    /// Record the actor's sign-off for the curation's current review round
    ///
    /// Sign-offs are separate rows and do not bump `lock_version`. Returns
    /// `None` when the actor had already signed off in this round.
    pub async fn record_review_approval(
        &self,
        conn: &mut SqliteConnection,
        actor: &Actor,
        curation_id: Uuid,
    ) -> Result<Option<AuditEvent>> {
        let repo = ScopedRepository::new(actor);
        let curation = repo
            .curation_for(&mut *conn, curation_id, Action::ReviewStage)
            .await?;
        let actor_id = acting_user(actor)?;

        if curation.stage != WorkflowStage::Review {
            return Err(CurationError::InvalidInput(format!(
                "curation is in stage '{}', sign-offs are only recorded in 'review'",
                curation.stage
            )));
        }

        let policy = self
            .resolver
            .resolve(&mut *conn, curation.scope_id, curation.workflow_pair.as_deref())
            .await?;
        if actor_id == curation.creator_id && !policy.allows_self_review() {
            warn!(curation_id = %curation_id, actor = %actor, "Creator attempted to sign off own curation");
            return Err(ReviewViolation::SelfReview.into());
        }

        let mut tx = conn.begin().await?;
        let recorded =
            store::approvals::record(&mut tx, curation_id, curation.review_round, actor_id).await?;
        if !recorded {
            return Ok(None);
        }
        let event = AuditEvent::ReviewApprovalRecorded {
            curation_id,
            scope_id: curation.scope_id,
            review_round: curation.review_round,
            actor_id,
            timestamp: gcur_common::time::now(),
        };
        store::audit::insert(&mut tx, &event, Some(actor_id)).await?;
        tx.commit().await?;

        info!(curation_id = %curation_id, actor = %actor, round = curation.review_round, "Review sign-off recorded");
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn required(min_reviewers: u32, allow_self_review: bool) -> ReviewDecision {
        ReviewDecision::Required {
            min_reviewers,
            allow_self_review,
        }
    }

    #[test]
    fn test_not_required_passes() {
        let decision = ReviewDecision::NotRequired {
            exemption: crate::review_policy::ReviewExemption::TransitionNotGated,
        };
        let creator = Uuid::new_v4();
        assert_eq!(
            check_independent_review(&decision, creator, creator, &[]).unwrap(),
            Vec::<Uuid>::new()
        );
    }

    #[test]
    fn test_self_review_rejected() {
        let creator = Uuid::new_v4();
        assert_eq!(
            check_independent_review(&required(1, false), creator, creator, &[]),
            Err(ReviewViolation::SelfReview)
        );
    }

    #[test]
    fn test_self_review_allowed_when_configured() {
        let creator = Uuid::new_v4();
        assert_eq!(
            check_independent_review(&required(1, true), creator, creator, &[]).unwrap(),
            vec![creator]
        );
    }

    #[test]
    fn test_other_reviewer_accepted() {
        let creator = Uuid::new_v4();
        let reviewer = Uuid::new_v4();
        assert_eq!(
            check_independent_review(&required(1, false), creator, reviewer, &[]).unwrap(),
            vec![reviewer]
        );
    }

    #[test]
    fn test_distinct_reviewers_counted() {
        let creator = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        // Repeat sign-offs by the actor count once
        assert_eq!(
            check_independent_review(&required(2, false), creator, a, &[a]),
            Err(ReviewViolation::InsufficientReviewers {
                required: 2,
                found: 1
            })
        );
        // Creator sign-offs never count
        assert_eq!(
            check_independent_review(&required(2, false), creator, a, &[creator]),
            Err(ReviewViolation::InsufficientReviewers {
                required: 2,
                found: 1
            })
        );
        assert_eq!(
            check_independent_review(&required(2, false), creator, a, &[b]).unwrap(),
            vec![b, a]
        );
    }

    fn curation(status: ScoreStatus, stage: WorkflowStage) -> Curation {
        Curation {
            id: Uuid::new_v4(),
            scope_id: Uuid::new_v4(),
            gene_id: "HGNC:1100".to_string(),
            workflow_pair: None,
            schema_id: None,
            creator_id: Uuid::new_v4(),
            stage,
            lock_version: 1,
            is_current: true,
            evidence_frozen: !stage.is_editable(),
            review_round: 0,
            score: None,
            classification: None,
            score_status: status,
            score_detail: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_submission_requires_scored_evidence() {
        assert!(ensure_submittable(&curation(ScoreStatus::Scored, WorkflowStage::Curation)).is_ok());

        let err = ensure_submittable(&curation(ScoreStatus::Pending, WorkflowStage::Curation))
            .unwrap_err();
        assert!(matches!(err, CurationError::EvidenceValidation(_)));

        let mut incomplete = curation(ScoreStatus::Incomplete, WorkflowStage::Curation);
        incomplete.score_detail = Some(
            serde_json::to_value(EvidenceValidationError {
                issues: Vec::new(),
                missing_categories: vec![crate::scoring::EvidenceCategory::Segregation],
            })
            .unwrap(),
        );
        match ensure_submittable(&incomplete).unwrap_err() {
            CurationError::EvidenceValidation(e) => {
                assert_eq!(
                    e.missing_categories,
                    vec![crate::scoring::EvidenceCategory::Segregation]
                );
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_evidence_frozen_outside_curator_stages() {
        assert!(ensure_evidence_editable(&curation(ScoreStatus::Pending, WorkflowStage::Entry)).is_ok());
        assert_eq!(
            ensure_evidence_editable(&curation(ScoreStatus::Scored, WorkflowStage::Review)),
            Err(DenyReason::EvidenceFrozen {
                stage: WorkflowStage::Review
            })
        );
    }
}
