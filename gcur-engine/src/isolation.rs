//! Row-Level Isolation Layer
//!
//! `ScopedRepository` is the only way the rest of the engine reads
//! scope-owned rows. It is built around an explicit `Actor` (background jobs
//! use `Actor::system`), applies the read filter inside the SQL query, and
//! authorizes every scoped write before the caller gets to mutate anything.
//! Nothing is cached between calls.

use crate::access::{self, Action, Decision};
use crate::error::{CurationError, DenyReason, Result};
use crate::scoring::EvidenceItem;
use crate::store;
use crate::store::audit::AuditRecord;
use gcur_common::{Actor, Curation, Membership, Scope, WorkflowStage};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

/// Curation list filter; every field narrows the result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurationQuery {
    pub scope_id: Option<Uuid>,
    pub gene_id: Option<String>,
    pub stage: Option<WorkflowStage>,
    /// Only the current active record per gene
    #[serde(default)]
    pub current_only: bool,
}

pub struct ScopedRepository<'a> {
    actor: &'a Actor,
}

impl<'a> ScopedRepository<'a> {
    pub fn new(actor: &'a Actor) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &Actor {
        self.actor
    }

    /// Authorize `action` in `scope_id` or fail with `Unauthorized`
    pub async fn authorize(
        &self,
        conn: &mut SqliteConnection,
        scope_id: Uuid,
        action: Action,
    ) -> Result<()> {
        match access::authorize_in_store(conn, self.actor, scope_id, action).await? {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                match &reason {
                    DenyReason::InsufficientRole { .. } | DenyReason::ScopeInactive => {
                        info!(actor = %self.actor, scope_id = %scope_id, action = ?action, reason = %reason, "Denied")
                    }
                    _ => warn!(actor = %self.actor, action = ?action, reason = %reason, "Denied"),
                }
                Err(CurationError::Unauthorized(reason))
            }
        }
    }

    /// Scope metadata, if readable
    pub async fn scope(&self, conn: &mut SqliteConnection, scope_id: Uuid) -> Result<Scope> {
        self.authorize(&mut *conn, scope_id, Action::Read).await?;
        store::scopes::load(conn, scope_id)
            .await?
            .ok_or(CurationError::Unauthorized(DenyReason::NotVisible))
    }

    /// A readable curation; unknown and unreadable ids are indistinguishable
    pub async fn curation(&self, conn: &mut SqliteConnection, curation_id: Uuid) -> Result<Curation> {
        let filter = access::read_filter(&mut *conn, self.actor).await?;
        store::curations::load_visible(conn, curation_id, &filter)
            .await?
            .ok_or(CurationError::Unauthorized(DenyReason::NotVisible))
    }

    /// A readable curation on which `action` is also authorized
    pub async fn curation_for(
        &self,
        conn: &mut SqliteConnection,
        curation_id: Uuid,
        action: Action,
    ) -> Result<Curation> {
        let curation = self.curation(&mut *conn, curation_id).await?;
        if action != Action::Read {
            self.authorize(conn, curation.scope_id, action).await?;
        }
        Ok(curation)
    }

    pub async fn curations(
        &self,
        conn: &mut SqliteConnection,
        query: &CurationQuery,
    ) -> Result<Vec<Curation>> {
        let filter = access::read_filter(&mut *conn, self.actor).await?;
        Ok(store::curations::list_visible(conn, &filter, query).await?)
    }

    pub async fn evidence(
        &self,
        conn: &mut SqliteConnection,
        curation_id: Uuid,
    ) -> Result<Vec<EvidenceItem>> {
        let curation = self.curation(&mut *conn, curation_id).await?;
        Ok(store::evidence::list_for_curation(conn, curation.id).await?)
    }

    /// Membership roster; requires member-management rights
    pub async fn members(
        &self,
        conn: &mut SqliteConnection,
        scope_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<Membership>> {
        self.authorize(&mut *conn, scope_id, Action::ManageMembers).await?;
        Ok(store::memberships::list_for_scope(conn, scope_id, include_inactive).await?)
    }

    pub async fn audit_trail(
        &self,
        conn: &mut SqliteConnection,
        curation_id: Uuid,
    ) -> Result<Vec<AuditRecord>> {
        let curation = self.curation(&mut *conn, curation_id).await?;
        Ok(store::audit::list_for_curation(conn, curation.id).await?)
    }
}
