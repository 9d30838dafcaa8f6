//! Workflow and scoring configuration writes
//!
//! The workflow engine only reads these; the writes live here for the
//! surrounding administration layer.

use crate::access::Action;
use crate::error::{CurationError, DenyReason, Result};
use crate::isolation::ScopedRepository;
use crate::review_policy::{ReviewPolicyConfig, WorkflowConfiguration};
use crate::scoring::ScoringConfig;
use crate::store;
use gcur_common::Actor;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

/// Store the scope-level (`workflow_pair: None`) or pair-specific policy
pub async fn put_workflow_configuration(
    conn: &mut SqliteConnection,
    actor: &Actor,
    scope_id: Uuid,
    workflow_pair: Option<String>,
    policy: ReviewPolicyConfig,
) -> Result<WorkflowConfiguration> {
    ScopedRepository::new(actor)
        .authorize(&mut *conn, scope_id, Action::ConfigureScope)
        .await?;
    policy.validate()?;
    if workflow_pair.as_deref().is_some_and(|p| p.trim().is_empty()) {
        return Err(CurationError::InvalidInput(
            "workflow_pair must not be blank".to_string(),
        ));
    }

    let config = WorkflowConfiguration {
        scope_id,
        workflow_pair,
        policy,
        updated_by: actor.user_id(),
        updated_at: gcur_common::time::now(),
    };
    store::workflow_configs::save(conn, &config).await?;
    info!(
        scope_id = %scope_id,
        workflow_pair = ?config.workflow_pair,
        actor = %actor,
        "Workflow configuration saved"
    );
    Ok(config)
}

/// Exact lookup of a stored configuration (no fallback)
pub async fn get_workflow_configuration(
    conn: &mut SqliteConnection,
    actor: &Actor,
    scope_id: Uuid,
    workflow_pair: Option<&str>,
) -> Result<Option<WorkflowConfiguration>> {
    ScopedRepository::new(actor)
        .authorize(&mut *conn, scope_id, Action::Read)
        .await?;
    Ok(store::workflow_configs::load(conn, scope_id, workflow_pair).await?)
}

/// Register the scoring configuration for a curation schema
pub async fn put_scoring_configuration(
    conn: &mut SqliteConnection,
    actor: &Actor,
    schema_id: &str,
    config: &ScoringConfig,
) -> Result<()> {
    if !actor.is_app_admin() {
        return Err(match actor {
            Actor::Anonymous => DenyReason::Anonymous,
            Actor::User { .. } => DenyReason::AdminOnly,
        }
        .into());
    }
    if schema_id.trim().is_empty() {
        return Err(CurationError::InvalidInput("schema_id must not be empty".to_string()));
    }
    config
        .validate()
        .map_err(|e| CurationError::InvalidInput(e.to_string()))?;
    store::scoring_configs::save(conn, schema_id, config).await?;
    info!(schema_id, name = %config.name, "Scoring configuration saved");
    Ok(())
}
