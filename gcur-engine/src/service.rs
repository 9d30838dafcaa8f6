//! Curation service facade
//!
//! Owns the pool, the event bus and the default scoring configuration, and
//! exposes the engine's external operations. Each call acquires one pooled
//! connection, runs the operation with an explicit `Actor`, and broadcasts
//! the committed audit events.

use crate::access::{self, Action, Decision, ReadFilter};
use crate::configuration;
use crate::curation::{self, EvidenceMutation, NewCuration};
use crate::error::Result;
use crate::isolation::{CurationQuery, ScopedRepository};
use crate::membership::{self, NewScope, ScopeUpdate};
use crate::review_policy::{ReviewPolicyConfig, WorkflowConfiguration};
use crate::scoring::{
    score_evidence, EvidenceEntry, EvidenceInput, EvidenceItem, EvidenceValidationError,
    ScoreResult, ScoringConfig,
};
use crate::store::audit::AuditRecord;
use crate::workflow::{TransitionOutcome, WorkflowEngine};
use gcur_common::events::{AuditEvent, EventBus};
use gcur_common::models::User;
use gcur_common::{Actor, AppRole, Curation, Membership, Scope, ScopeRole, Visibility, WorkflowStage};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone)]
pub struct CurationService {
    db: SqlitePool,
    event_bus: EventBus,
    default_scoring: Arc<ScoringConfig>,
    workflow: WorkflowEngine,
}

impl CurationService {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self::with_scoring(db, event_bus, ScoringConfig::default())
    }

    /// Use `default_scoring` for curations without a schema
    pub fn with_scoring(db: SqlitePool, event_bus: EventBus, default_scoring: ScoringConfig) -> Self {
        Self {
            db,
            event_bus,
            default_scoring: Arc::new(default_scoring),
            workflow: WorkflowEngine::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    pub fn default_scoring(&self) -> &ScoringConfig {
        &self.default_scoring
    }

    /// Follow committed audit events
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.event_bus.subscribe()
    }

    async fn conn(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.db.acquire().await?)
    }

    fn publish(&self, events: impl IntoIterator<Item = AuditEvent>) {
        for event in events {
            self.event_bus.emit_lossy(event);
        }
    }

    // ========================================================================
    // Access control
    // ========================================================================

    /// `Authorize(actor, scope, action)`
    pub async fn authorize(&self, actor: &Actor, scope_id: Uuid, action: Action) -> Result<Decision> {
        let mut conn = self.conn().await?;
        Ok(access::authorize_in_store(&mut conn, actor, scope_id, action).await?)
    }

    /// `AuthorizeRead(actor)`: predicate for the query layer
    pub async fn authorize_read(&self, actor: &Actor) -> Result<ReadFilter> {
        let mut conn = self.conn().await?;
        Ok(access::read_filter(&mut conn, actor).await?)
    }

    // ========================================================================
    // Users, scopes, memberships
    // ========================================================================

    pub async fn bootstrap_admin(&self, username: &str) -> Result<User> {
        let mut conn = self.conn().await?;
        membership::bootstrap_admin(&mut conn, username).await
    }

    pub async fn create_user(&self, actor: &Actor, username: &str, role: AppRole) -> Result<User> {
        let mut conn = self.conn().await?;
        membership::create_user(&mut conn, actor, username, role).await
    }

    pub async fn load_actor(&self, user_id: Uuid) -> Result<Actor> {
        let mut conn = self.conn().await?;
        membership::load_actor(&mut conn, user_id).await
    }

    pub async fn create_scope(&self, actor: &Actor, name: &str, visibility: Visibility) -> Result<Scope> {
        let mut conn = self.conn().await?;
        membership::create_scope(
            &mut conn,
            actor,
            NewScope {
                name: name.to_string(),
                visibility,
            },
        )
        .await
    }

    pub async fn get_scope(&self, actor: &Actor, scope_id: Uuid) -> Result<Scope> {
        let mut conn = self.conn().await?;
        ScopedRepository::new(actor).scope(&mut conn, scope_id).await
    }

    pub async fn update_scope(&self, actor: &Actor, scope_id: Uuid, update: ScopeUpdate) -> Result<Scope> {
        let mut conn = self.conn().await?;
        let (scope, event) = membership::update_scope(&mut conn, actor, scope_id, update).await?;
        self.publish([event]);
        Ok(scope)
    }

    pub async fn set_scope_visibility(
        &self,
        actor: &Actor,
        scope_id: Uuid,
        visibility: Visibility,
    ) -> Result<Scope> {
        let update = ScopeUpdate {
            visibility: Some(visibility),
            is_active: None,
        };
        self.update_scope(actor, scope_id, update).await
    }

    pub async fn set_scope_active(&self, actor: &Actor, scope_id: Uuid, is_active: bool) -> Result<Scope> {
        let update = ScopeUpdate {
            visibility: None,
            is_active: Some(is_active),
        };
        self.update_scope(actor, scope_id, update).await
    }

    pub async fn invite_member(
        &self,
        actor: &Actor,
        scope_id: Uuid,
        user_id: Uuid,
        role: ScopeRole,
    ) -> Result<Membership> {
        let mut conn = self.conn().await?;
        let (membership, event) =
            membership::invite_member(&mut conn, actor, scope_id, user_id, role).await?;
        self.publish([event]);
        Ok(membership)
    }

    pub async fn accept_invitation(&self, actor: &Actor, scope_id: Uuid) -> Result<Membership> {
        let mut conn = self.conn().await?;
        let (membership, event) = membership::accept_invitation(&mut conn, actor, scope_id).await?;
        self.publish([event]);
        Ok(membership)
    }

    pub async fn deactivate_membership(&self, actor: &Actor, scope_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut conn = self.conn().await?;
        let event = membership::deactivate_membership(&mut conn, actor, scope_id, user_id).await?;
        self.publish([event]);
        Ok(())
    }

    pub async fn list_members(
        &self,
        actor: &Actor,
        scope_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<Membership>> {
        let mut conn = self.conn().await?;
        ScopedRepository::new(actor)
            .members(&mut conn, scope_id, include_inactive)
            .await
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub async fn put_workflow_configuration(
        &self,
        actor: &Actor,
        scope_id: Uuid,
        workflow_pair: Option<&str>,
        policy: ReviewPolicyConfig,
    ) -> Result<WorkflowConfiguration> {
        let mut conn = self.conn().await?;
        configuration::put_workflow_configuration(
            &mut conn,
            actor,
            scope_id,
            workflow_pair.map(str::to_string),
            policy,
        )
        .await
    }

    pub async fn get_workflow_configuration(
        &self,
        actor: &Actor,
        scope_id: Uuid,
        workflow_pair: Option<&str>,
    ) -> Result<Option<WorkflowConfiguration>> {
        let mut conn = self.conn().await?;
        configuration::get_workflow_configuration(&mut conn, actor, scope_id, workflow_pair).await
    }

    pub async fn put_scoring_configuration(
        &self,
        actor: &Actor,
        schema_id: &str,
        config: &ScoringConfig,
    ) -> Result<()> {
        let mut conn = self.conn().await?;
        configuration::put_scoring_configuration(&mut conn, actor, schema_id, config).await
    }

    // ========================================================================
    // Curations and evidence
    // ========================================================================

    pub async fn create_curation(
        &self,
        actor: &Actor,
        scope_id: Uuid,
        new_curation: NewCuration,
    ) -> Result<Curation> {
        let mut conn = self.conn().await?;
        let (curation, event) =
            curation::create_curation(&mut conn, actor, scope_id, new_curation).await?;
        self.publish([event]);
        Ok(curation)
    }

    pub async fn get_curation(&self, actor: &Actor, curation_id: Uuid) -> Result<Curation> {
        let mut conn = self.conn().await?;
        ScopedRepository::new(actor).curation(&mut conn, curation_id).await
    }

    pub async fn list_curations(&self, actor: &Actor, query: &CurationQuery) -> Result<Vec<Curation>> {
        let mut conn = self.conn().await?;
        ScopedRepository::new(actor).curations(&mut conn, query).await
    }

    pub async fn list_evidence(&self, actor: &Actor, curation_id: Uuid) -> Result<Vec<EvidenceItem>> {
        let mut conn = self.conn().await?;
        ScopedRepository::new(actor).evidence(&mut conn, curation_id).await
    }

    /// `UpsertEvidenceItem(curation_id, item, actor, expected_version)`
    pub async fn upsert_evidence(
        &self,
        actor: &Actor,
        curation_id: Uuid,
        input: EvidenceInput,
        expected_version: i64,
    ) -> Result<EvidenceMutation> {
        let mut conn = self.conn().await?;
        let (mutation, event) = curation::upsert_evidence(
            &mut conn,
            actor,
            &self.default_scoring,
            curation_id,
            input,
            expected_version,
        )
        .await?;
        self.publish([event]);
        Ok(mutation)
    }

    /// `RemoveEvidenceItem(curation_id, item_id, actor, expected_version)`
    pub async fn remove_evidence(
        &self,
        actor: &Actor,
        curation_id: Uuid,
        item_id: Uuid,
        expected_version: i64,
    ) -> Result<EvidenceMutation> {
        let mut conn = self.conn().await?;
        let (mutation, event) = curation::remove_evidence(
            &mut conn,
            actor,
            &self.default_scoring,
            curation_id,
            item_id,
            expected_version,
        )
        .await?;
        self.publish([event]);
        Ok(mutation)
    }

    /// `Score(evidence_items, scoring_config)` with the default configuration
    ///
    /// Side-effect free; nothing is read or written.
    pub fn preview_score(
        &self,
        entries: &[EvidenceEntry],
    ) -> std::result::Result<ScoreResult, EvidenceValidationError> {
        score_evidence(entries, &self.default_scoring)
    }

    // ========================================================================
    // Workflow
    // ========================================================================

    /// `RequestTransition(curation_id, to_stage, actor, expected_version)`
    pub async fn request_transition(
        &self,
        actor: &Actor,
        curation_id: Uuid,
        to: WorkflowStage,
        expected_version: i64,
    ) -> Result<TransitionOutcome> {
        let mut conn = self.conn().await?;
        let (outcome, events) = self
            .workflow
            .request_transition(&mut conn, actor, curation_id, to, expected_version)
            .await?;
        self.publish(events);
        Ok(outcome)
    }

    /// Record a review sign-off; returns false if it was already recorded
    pub async fn record_review_approval(&self, actor: &Actor, curation_id: Uuid) -> Result<bool> {
        let mut conn = self.conn().await?;
        let event = self
            .workflow
            .record_review_approval(&mut conn, actor, curation_id)
            .await?;
        let recorded = event.is_some();
        self.publish(event);
        Ok(recorded)
    }

    pub async fn audit_trail(&self, actor: &Actor, curation_id: Uuid) -> Result<Vec<AuditRecord>> {
        let mut conn = self.conn().await?;
        ScopedRepository::new(actor).audit_trail(&mut conn, curation_id).await
    }
}
