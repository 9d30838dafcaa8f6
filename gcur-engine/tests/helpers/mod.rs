//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use gcur_common::events::EventBus;
use gcur_common::{Actor, AppRole, Curation, Scope, ScopeRole, Visibility, WorkflowStage};
use gcur_engine::scoring::{CaseLevelVariant, EvidenceInput, EvidencePayload};
use gcur_engine::{CurationService, NewCuration};
use uuid::Uuid;

pub struct Fixture {
    pub service: CurationService,
    pub admin: Actor,
}

/// Fresh in-memory store with one application admin
pub async fn fixture() -> Fixture {
    let pool = gcur_common::db::init_memory_database().await.unwrap();
    let service = CurationService::new(pool, EventBus::new(64));
    let admin = service.bootstrap_admin("root").await.unwrap().actor();
    Fixture { service, admin }
}

impl Fixture {
    pub async fn user(&self, username: &str) -> Actor {
        self.service
            .create_user(&self.admin, username, AppRole::User)
            .await
            .unwrap()
            .actor()
    }

    pub async fn scope(&self, name: &str, visibility: Visibility) -> Scope {
        self.service
            .create_scope(&self.admin, name, visibility)
            .await
            .unwrap()
    }

    /// New user with an accepted membership
    pub async fn member(&self, scope: &Scope, username: &str, role: ScopeRole) -> Actor {
        let actor = self.user(username).await;
        self.service
            .invite_member(&self.admin, scope.id, user_id(&actor), role)
            .await
            .unwrap();
        self.service.accept_invitation(&actor, scope.id).await.unwrap();
        actor
    }

    pub async fn curation(&self, actor: &Actor, scope: &Scope, gene_id: &str) -> Curation {
        self.service
            .create_curation(
                actor,
                scope.id,
                NewCuration {
                    gene_id: gene_id.to_string(),
                    workflow_pair: None,
                    schema_id: None,
                },
            )
            .await
            .unwrap()
    }

    /// Add evidence and walk a curation to `review`; returns the current version
    pub async fn submitted(&self, curator: &Actor, scope: &Scope, gene_id: &str) -> Curation {
        let curation = self.curation(curator, scope, gene_id).await;
        let mutation = self
            .service
            .upsert_evidence(curator, curation.id, predicted_null(1, true), curation.lock_version)
            .await
            .unwrap();
        let mut version = mutation.new_version;
        for to in [
            WorkflowStage::Precuration,
            WorkflowStage::Curation,
            WorkflowStage::Review,
        ] {
            version = self
                .service
                .request_transition(curator, curation.id, to, version)
                .await
                .unwrap()
                .new_version;
        }
        self.service.get_curation(curator, curation.id).await.unwrap()
    }
}

pub fn user_id(actor: &Actor) -> Uuid {
    actor.user_id().unwrap()
}

pub fn predicted_null(proband_count: u32, de_novo: bool) -> EvidenceInput {
    EvidenceInput {
        id: None,
        payload: EvidencePayload::CaseLevelPredictedNull(CaseLevelVariant {
            proband_count: Some(proband_count),
            de_novo,
            ..Default::default()
        }),
    }
}

pub fn missense(proband_count: u32) -> EvidenceInput {
    EvidenceInput {
        id: None,
        payload: EvidencePayload::CaseLevelOtherVariant(CaseLevelVariant {
            proband_count: Some(proband_count),
            variant: Some("c.1234C>T".to_string()),
            ..Default::default()
        }),
    }
}
