//! Optimistic concurrency on `lock_version`
//!
//! Concurrent writers holding the same snapshot: exactly one commits, every
//! other one gets `ConcurrentModification` and changes nothing.

mod helpers;

use gcur_common::events::EventBus;
use gcur_common::{Actor, AppRole, ScopeRole, Visibility, WorkflowStage};
use gcur_engine::{CurationError, CurationService, NewCuration};
use helpers::{fixture, missense, predicted_null};
use tempfile::TempDir;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_racing_upserts_one_wins() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;
    let curation = f.curation(&curator, &kidney, "HGNC:9008").await;
    let version = curation.lock_version;

    let (a, b) = tokio::join!(
        f.service
            .upsert_evidence(&curator, curation.id, predicted_null(1, true), version),
        f.service.upsert_evidence(&curator, curation.id, missense(1), version),
    );

    let outcomes = [a, b];
    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(CurationError::ConcurrentModification { expected, found })
                    if *expected == version && *found == version + 1
            )
        })
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 1);

    let after = f.service.get_curation(&curator, curation.id).await.unwrap();
    assert_eq!(after.lock_version, version + 1);
    assert_eq!(
        f.service.list_evidence(&curator, curation.id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_racing_writers_on_disk_store() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("gcur.db");
    let pool = gcur_common::db::init_database(&db_path).await.unwrap();
    let service = CurationService::new(pool, EventBus::new(64));

    let admin = service.bootstrap_admin("root").await.unwrap().actor();
    let scope = service
        .create_scope(&admin, "kidney-genetics", Visibility::Private)
        .await
        .unwrap();
    let curator = service
        .create_user(&admin, "curator", AppRole::User)
        .await
        .unwrap()
        .actor();
    let curator_id = curator.user_id().unwrap();
    service
        .invite_member(&admin, scope.id, curator_id, ScopeRole::Curator)
        .await
        .unwrap();
    service.accept_invitation(&curator, scope.id).await.unwrap();
    let curation = service
        .create_curation(
            &curator,
            scope.id,
            NewCuration {
                gene_id: "HGNC:9008".to_string(),
                workflow_pair: None,
                schema_id: None,
            },
        )
        .await
        .unwrap();
    let version = curation.lock_version;

    let mut join_set = JoinSet::new();
    for i in 0..8u32 {
        let service = service.clone();
        let curation_id = curation.id;
        join_set.spawn(async move {
            service
                .upsert_evidence(&curator, curation_id, predicted_null(i + 1, false), version)
                .await
        });
    }

    let mut committed = 0;
    let mut conflicted = 0;
    while let Some(joined) = join_set.join_next().await {
        match joined.unwrap() {
            Ok(mutation) => {
                assert_eq!(mutation.new_version, version + 1);
                committed += 1;
            }
            Err(CurationError::ConcurrentModification { expected, .. }) => {
                assert_eq!(expected, version);
                conflicted += 1;
            }
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(committed, 1);
    assert_eq!(conflicted, 7);

    let after = service.get_curation(&curator, curation.id).await.unwrap();
    assert_eq!(after.lock_version, version + 1);
    assert_eq!(service.list_evidence(&curator, curation.id).await.unwrap().len(), 1);

    // One audit row for the one committed write
    let trail = service.audit_trail(&curator, curation.id).await.unwrap();
    assert_eq!(trail.len(), 2);
}

#[tokio::test]
async fn test_stale_transition_rejected_without_effect() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;
    let curation = f.curation(&curator, &kidney, "HGNC:9008").await;
    let stale = curation.lock_version;

    f.service
        .upsert_evidence(&curator, curation.id, predicted_null(1, true), stale)
        .await
        .unwrap();

    let result = f
        .service
        .request_transition(&curator, curation.id, WorkflowStage::Precuration, stale)
        .await;
    assert!(matches!(
        result,
        Err(CurationError::ConcurrentModification { expected, found })
            if expected == stale && found == stale + 1
    ));
    assert!(result.unwrap_err().is_conflict());

    let after = f.service.get_curation(&curator, curation.id).await.unwrap();
    assert_eq!(after.stage, WorkflowStage::Entry);
    assert_eq!(after.lock_version, stale + 1);
}

#[tokio::test]
async fn test_stale_removal_keeps_item() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;
    let curation = f.curation(&curator, &kidney, "HGNC:9008").await;

    let added = f
        .service
        .upsert_evidence(&curator, curation.id, predicted_null(1, true), curation.lock_version)
        .await
        .unwrap();

    let result = f
        .service
        .remove_evidence(&curator, curation.id, added.item_id, curation.lock_version)
        .await;
    assert!(matches!(
        result,
        Err(CurationError::ConcurrentModification { .. })
    ));
    assert_eq!(
        f.service.list_evidence(&curator, curation.id).await.unwrap().len(),
        1
    );

    let removed = f
        .service
        .remove_evidence(&curator, curation.id, added.item_id, added.new_version)
        .await
        .unwrap();
    assert_eq!(removed.new_version, added.new_version + 1);
    assert!(f
        .service
        .list_evidence(&curator, curation.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unauthorized_write_does_not_consume_version() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;
    let curation = f.curation(&curator, &kidney, "HGNC:9008").await;

    let denied = f
        .service
        .upsert_evidence(&Actor::Anonymous, curation.id, missense(1), curation.lock_version)
        .await;
    assert!(denied.is_err());

    let mutation = f
        .service
        .upsert_evidence(&curator, curation.id, missense(1), curation.lock_version)
        .await
        .unwrap();
    assert_eq!(mutation.new_version, curation.lock_version + 1);
}
