//! Curation creation and evidence mutations
//!
//! Evidence items are addressed one at a time but versioned as part of their
//! curation: every add, edit or removal goes through the concurrency guard
//! with the curation's `lock_version`, and recomputes the item contributions
//! and the set score inside the same transaction.

use crate::access::Action;
use crate::error::{CurationError, Result};
use crate::guard;
use crate::isolation::ScopedRepository;
use crate::scoring::{
    item_contribution, validate_item, EvidenceEntry, EvidenceInput, EvidenceItem, ItemContribution,
    ScoreState, ScoringConfig,
};
use crate::store;
use crate::workflow::ensure_evidence_editable;
use gcur_common::events::AuditEvent;
use gcur_common::models::ScoreStatus;
use gcur_common::{Actor, Curation, WorkflowStage};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCuration {
    pub gene_id: String,
    #[serde(default)]
    pub workflow_pair: Option<String>,
    /// Scoring schema; `None` uses the default scoring configuration
    #[serde(default)]
    pub schema_id: Option<String>,
}

/// Result of an evidence add, edit or removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMutation {
    pub curation_id: Uuid,
    pub item_id: Uuid,
    pub new_version: i64,
    pub score: ScoreState,
}

fn acting_user(actor: &Actor) -> Result<Uuid> {
    actor
        .user_id()
        .ok_or(CurationError::Unauthorized(crate::error::DenyReason::Anonymous))
}

/// Scoring configuration for a curation's schema
pub(crate) async fn scoring_config_for(
    conn: &mut SqliteConnection,
    curation: &Curation,
    default: &ScoringConfig,
) -> Result<ScoringConfig> {
    match &curation.schema_id {
        Some(schema_id) => store::scoring_configs::load(conn, schema_id)
            .await?
            .ok_or_else(|| {
                CurationError::NotFound(format!("scoring configuration '{}'", schema_id))
            }),
        None => Ok(default.clone()),
    }
}

pub async fn create_curation(
    conn: &mut SqliteConnection,
    actor: &Actor,
    scope_id: Uuid,
    new_curation: NewCuration,
) -> Result<(Curation, AuditEvent)> {
    let repo = ScopedRepository::new(actor);
    repo.authorize(&mut *conn, scope_id, Action::CreateCuration).await?;
    let actor_id = acting_user(actor)?;

    let gene_id = new_curation.gene_id.trim().to_string();
    if gene_id.is_empty() {
        return Err(CurationError::InvalidInput("gene_id must not be empty".to_string()));
    }
    if let Some(schema_id) = &new_curation.schema_id {
        if store::scoring_configs::load(&mut *conn, schema_id).await?.is_none() {
            return Err(CurationError::InvalidInput(format!(
                "unknown scoring schema '{}'",
                schema_id
            )));
        }
    }

    let now = gcur_common::time::now();
    let curation = Curation {
        id: gcur_common::uuid_utils::generate(),
        scope_id,
        gene_id,
        workflow_pair: new_curation.workflow_pair,
        schema_id: new_curation.schema_id,
        creator_id: actor_id,
        stage: WorkflowStage::Entry,
        lock_version: 1,
        is_current: false,
        evidence_frozen: false,
        review_round: 0,
        score: None,
        classification: None,
        score_status: ScoreStatus::Pending,
        score_detail: None,
        created_at: now,
        updated_at: now,
    };
    let event = AuditEvent::CurationCreated {
        curation_id: curation.id,
        scope_id,
        gene_id: curation.gene_id.clone(),
        actor_id,
        timestamp: now,
    };

    let mut tx = conn.begin().await?;
    store::curations::insert(&mut tx, &curation).await?;
    store::audit::insert(&mut tx, &event, Some(actor_id)).await?;
    tx.commit().await?;

    info!(curation_id = %curation.id, scope_id = %scope_id, gene_id = %curation.gene_id, actor = %actor, "Curation created");
    Ok((curation, event))
}

/// Contributions for every item plus the set score
fn rescore(
    entries: &[EvidenceEntry],
    config: &ScoringConfig,
) -> (Vec<(Uuid, Option<ItemContribution>)>, ScoreState) {
    let contributions = entries
        .iter()
        .map(|entry| {
            let contribution = validate_item(entry)
                .ok()
                .and_then(|_| config.rule(entry.payload.category()))
                .map(|rule| item_contribution(&entry.payload, rule));
            (entry.id, contribution)
        })
        .collect();
    (contributions, ScoreState::evaluate(entries, config))
}

/// Snapshot checks shared by upsert and remove
async fn editable_snapshot(
    conn: &mut SqliteConnection,
    actor: &Actor,
    curation_id: Uuid,
    expected_version: i64,
) -> Result<Curation> {
    let curation = ScopedRepository::new(actor)
        .curation_for(conn, curation_id, Action::EditEvidence)
        .await?;
    ensure_evidence_editable(&curation)?;
    guard::check_version(expected_version, curation.lock_version)?;
    Ok(curation)
}

/// `UpsertEvidenceItem(curation_id, item, actor, expected_version)`
pub async fn upsert_evidence(
    conn: &mut SqliteConnection,
    actor: &Actor,
    default_scoring: &ScoringConfig,
    curation_id: Uuid,
    input: EvidenceInput,
    expected_version: i64,
) -> Result<(EvidenceMutation, AuditEvent)> {
    let curation = editable_snapshot(&mut *conn, actor, curation_id, expected_version).await?;
    let actor_id = acting_user(actor)?;

    let entry = EvidenceEntry {
        id: input.id.unwrap_or_else(gcur_common::uuid_utils::generate),
        payload: input.payload,
    };
    validate_item(&entry)?;

    let mut items = store::evidence::list_for_curation(&mut *conn, curation_id).await?;
    let now = gcur_common::time::now();
    let item = match input.id {
        Some(id) => {
            let existing = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| CurationError::NotFound(format!("evidence item {}", id)))?;
            existing.payload = entry.payload.clone();
            existing.updated_by = actor_id;
            existing.updated_at = now;
            existing.clone()
        }
        None => {
            let item = EvidenceItem {
                id: entry.id,
                curation_id,
                payload: entry.payload.clone(),
                contribution: None,
                created_by: actor_id,
                created_at: now,
                updated_by: actor_id,
                updated_at: now,
            };
            items.push(item.clone());
            item
        }
    };

    let config = scoring_config_for(&mut *conn, &curation, default_scoring).await?;
    let entries: Vec<EvidenceEntry> = items.iter().map(EvidenceItem::entry).collect();
    let (contributions, score) = rescore(&entries, &config);
    let category = item.category().to_string();
    let item_id = item.id;
    let scope_id = curation.scope_id;
    let state = score.clone();

    let applied = guard::apply(conn, curation_id, expected_version, move |tx, new_version| {
        Box::pin(async move {
            store::evidence::upsert(&mut *tx, &item).await?;
            for (id, contribution) in contributions {
                store::evidence::set_contribution(&mut *tx, id, contribution).await?;
            }
            store::curations::update_score(&mut *tx, curation_id, &state).await?;

            let event = AuditEvent::EvidenceUpserted {
                curation_id,
                scope_id,
                item_id,
                category,
                actor_id,
                lock_version: new_version,
                timestamp: now,
            };
            store::audit::insert(&mut *tx, &event, Some(actor_id)).await?;
            Ok::<_, CurationError>(event)
        })
    })
    .await?;

    debug!(curation_id = %curation_id, item_id = %item_id, lock_version = applied.new_version, "Evidence upserted");
    Ok((
        EvidenceMutation {
            curation_id,
            item_id,
            new_version: applied.new_version,
            score,
        },
        applied.value,
    ))
}

/// `RemoveEvidenceItem(curation_id, item_id, actor, expected_version)`
pub async fn remove_evidence(
    conn: &mut SqliteConnection,
    actor: &Actor,
    default_scoring: &ScoringConfig,
    curation_id: Uuid,
    item_id: Uuid,
    expected_version: i64,
) -> Result<(EvidenceMutation, AuditEvent)> {
    let curation = editable_snapshot(&mut *conn, actor, curation_id, expected_version).await?;
    let actor_id = acting_user(actor)?;

    let mut items = store::evidence::list_for_curation(&mut *conn, curation_id).await?;
    let before = items.len();
    items.retain(|i| i.id != item_id);
    if items.len() == before {
        return Err(CurationError::NotFound(format!("evidence item {}", item_id)));
    }

    let config = scoring_config_for(&mut *conn, &curation, default_scoring).await?;
    let entries: Vec<EvidenceEntry> = items.iter().map(EvidenceItem::entry).collect();
    let (contributions, score) = rescore(&entries, &config);
    let scope_id = curation.scope_id;
    let state = score.clone();

    let applied = guard::apply(conn, curation_id, expected_version, move |tx, new_version| {
        Box::pin(async move {
            if !store::evidence::delete(&mut *tx, curation_id, item_id).await? {
                return Err(CurationError::NotFound(format!("evidence item {}", item_id)));
            }
            for (id, contribution) in contributions {
                store::evidence::set_contribution(&mut *tx, id, contribution).await?;
            }
            store::curations::update_score(&mut *tx, curation_id, &state).await?;

            let event = AuditEvent::EvidenceRemoved {
                curation_id,
                scope_id,
                item_id,
                actor_id,
                lock_version: new_version,
                timestamp: gcur_common::time::now(),
            };
            store::audit::insert(&mut *tx, &event, Some(actor_id)).await?;
            Ok::<_, CurationError>(event)
        })
    })
    .await?;

    debug!(curation_id = %curation_id, item_id = %item_id, lock_version = applied.new_version, "Evidence removed");
    Ok((
        EvidenceMutation {
            curation_id,
            item_id,
            new_version: applied.new_version,
            score,
        },
        applied.value,
    ))
}
