//! Evidence scoring through the service: stored scores, schemas, preview

mod helpers;

use gcur_common::models::ScoreStatus;
use gcur_common::{ScopeRole, Visibility};
use gcur_engine::scoring::{
    EvidenceCategory, EvidenceEntry, EvidenceInput, EvidencePayload, ExperimentalEvidence,
    ItemContribution, SegregationEvidence, SequencingMethod,
};
use gcur_engine::{CurationError, DenyReason, NewCuration, ScoreState, ScoringConfig};
use helpers::{fixture, missense, predicted_null};
use uuid::Uuid;

fn entry(id: u128, payload: EvidencePayload) -> EvidenceEntry {
    EvidenceEntry {
        id: Uuid::from_u128(id),
        payload,
    }
}

fn model_system(count: u32) -> EvidencePayload {
    EvidencePayload::ModelSystem(ExperimentalEvidence {
        experiment_count: Some(count),
        description: Some("zebrafish knockdown".to_string()),
    })
}

fn segregation(lod: f64) -> EvidencePayload {
    EvidencePayload::Segregation(SegregationEvidence {
        sequencing_method: Some(SequencingMethod::ExomeGenome),
        lod_score: Some(lod),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_de_novo_predicted_null_probands_scored_and_stored() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;
    let curation = f.curation(&curator, &kidney, "HGNC:9008").await;
    assert_eq!(curation.score_status, ScoreStatus::Pending);

    let mutation = f
        .service
        .upsert_evidence(&curator, curation.id, predicted_null(3, true), curation.lock_version)
        .await
        .unwrap();
    let result = mutation.score.result().unwrap();
    assert_eq!(result.total_score, 6.0);
    assert_eq!(result.classification, "Limited");

    let stored = f.service.get_curation(&curator, curation.id).await.unwrap();
    assert_eq!(stored.score_status, ScoreStatus::Scored);
    assert_eq!(stored.score, Some(6.0));
    assert_eq!(stored.classification.as_deref(), Some("Limited"));

    let items = f.service.list_evidence(&curator, curation.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, mutation.item_id);
    assert_eq!(
        items[0].contribution,
        Some(ItemContribution::Points { points: 6.0 })
    );
}

#[tokio::test]
async fn test_editing_item_rescores() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;
    let curation = f.curation(&curator, &kidney, "HGNC:9008").await;

    let added = f
        .service
        .upsert_evidence(&curator, curation.id, predicted_null(1, false), curation.lock_version)
        .await
        .unwrap();
    assert_eq!(added.score.result().unwrap().total_score, 1.5);

    let mut edit = predicted_null(2, true);
    edit.id = Some(added.item_id);
    let edited = f
        .service
        .upsert_evidence(&curator, curation.id, edit, added.new_version)
        .await
        .unwrap();
    assert_eq!(edited.item_id, added.item_id);
    assert_eq!(edited.score.result().unwrap().total_score, 4.0);
    assert_eq!(
        f.service.list_evidence(&curator, curation.id).await.unwrap().len(),
        1
    );

    let mut unknown = missense(1);
    unknown.id = Some(Uuid::new_v4());
    assert!(matches!(
        f.service
            .upsert_evidence(&curator, curation.id, unknown, edited.new_version)
            .await,
        Err(CurationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_item_rejected_before_write() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;
    let curation = f.curation(&curator, &kidney, "HGNC:9008").await;

    let result = f
        .service
        .upsert_evidence(&curator, curation.id, predicted_null(0, true), curation.lock_version)
        .await;
    match result {
        Err(CurationError::EvidenceValidation(err)) => {
            assert_eq!(err.issues.len(), 1);
            assert_eq!(err.issues[0].field, "proband_count");
        }
        other => panic!("expected validation failure, got {:?}", other),
    }

    let unchanged = f.service.get_curation(&curator, curation.id).await.unwrap();
    assert_eq!(unchanged.lock_version, curation.lock_version);
    assert!(f
        .service
        .list_evidence(&curator, curation.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_insertion_order_does_not_change_score() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;

    let payloads = vec![
        predicted_null(2, true).payload,
        missense(3).payload,
        segregation(2.4),
        model_system(1),
        segregation(1.1),
    ];

    let mut results = Vec::new();
    for (n, order) in [vec![0, 1, 2, 3, 4], vec![4, 3, 2, 1, 0], vec![2, 0, 4, 1, 3]]
        .into_iter()
        .enumerate()
    {
        let curation = f.curation(&curator, &kidney, &format!("HGNC:{}", n)).await;
        let mut version = curation.lock_version;
        let mut last = None;
        for i in order {
            let input = EvidenceInput {
                id: None,
                payload: payloads[i].clone(),
            };
            let mutation = f
                .service
                .upsert_evidence(&curator, curation.id, input, version)
                .await
                .unwrap();
            version = mutation.new_version;
            last = Some(mutation.score);
        }
        let result = last.and_then(|s| s.result().cloned()).unwrap();
        results.push((
            result.total_score,
            result.classification.clone(),
            result.categories.clone(),
        ));
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], results[2]);
    // 4.0 + 0.3 + ladder(3.5) + 2.0
    assert_eq!(results[0].0, 8.3);
    assert_eq!(results[0].1, "Moderate");
}

#[tokio::test]
async fn test_schema_with_required_categories_marks_incomplete() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;

    let strict = ScoringConfig {
        name: "strict".to_string(),
        required_categories: vec![EvidenceCategory::Segregation],
        ..Default::default()
    };
    assert!(matches!(
        f.service
            .put_scoring_configuration(&curator, "strict", &strict)
            .await,
        Err(CurationError::Unauthorized(DenyReason::AdminOnly))
    ));
    f.service
        .put_scoring_configuration(&f.admin, "strict", &strict)
        .await
        .unwrap();

    let curation = f
        .service
        .create_curation(
            &curator,
            kidney.id,
            NewCuration {
                gene_id: "HGNC:9008".to_string(),
                workflow_pair: None,
                schema_id: Some("strict".to_string()),
            },
        )
        .await
        .unwrap();

    let first = f
        .service
        .upsert_evidence(&curator, curation.id, predicted_null(3, true), curation.lock_version)
        .await
        .unwrap();
    match &first.score {
        ScoreState::Incomplete(err) => {
            assert_eq!(err.missing_categories, vec![EvidenceCategory::Segregation]);
        }
        other => panic!("expected incomplete score, got {:?}", other),
    }
    let stored = f.service.get_curation(&curator, curation.id).await.unwrap();
    assert_eq!(stored.score_status, ScoreStatus::Incomplete);
    assert_eq!(stored.score, None);
    assert_eq!(stored.classification, None);

    let second = f
        .service
        .upsert_evidence(
            &curator,
            curation.id,
            EvidenceInput {
                id: None,
                payload: segregation(3.0),
            },
            first.new_version,
        )
        .await
        .unwrap();
    assert_eq!(second.score.result().unwrap().total_score, 8.0);
}

#[tokio::test]
async fn test_unknown_schema_rejected() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;

    let result = f
        .service
        .create_curation(
            &curator,
            kidney.id,
            NewCuration {
                gene_id: "HGNC:9008".to_string(),
                workflow_pair: None,
                schema_id: Some("missing".to_string()),
            },
        )
        .await;
    assert!(matches!(result, Err(CurationError::InvalidInput(_))));
}

#[tokio::test]
async fn test_invalid_scoring_configuration_rejected() {
    let f = fixture().await;
    let broken = ScoringConfig {
        total_cap: -1.0,
        ..Default::default()
    };
    assert!(matches!(
        f.service
            .put_scoring_configuration(&f.admin, "broken", &broken)
            .await,
        Err(CurationError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_preview_matches_stored_score() {
    let f = fixture().await;
    let kidney = f.scope("kidney-genetics", Visibility::Private).await;
    let curator = f.member(&kidney, "curator", ScopeRole::Curator).await;
    let curation = f.curation(&curator, &kidney, "HGNC:9008").await;

    let a = f
        .service
        .upsert_evidence(&curator, curation.id, predicted_null(1, true), curation.lock_version)
        .await
        .unwrap();
    let b = f
        .service
        .upsert_evidence(&curator, curation.id, missense(1), a.new_version)
        .await
        .unwrap();

    let items = f.service.list_evidence(&curator, curation.id).await.unwrap();
    let entries: Vec<EvidenceEntry> = items.iter().map(|i| i.entry()).collect();
    let preview = f.service.preview_score(&entries).unwrap();
    assert_eq!(&preview, b.score.result().unwrap());
    assert_eq!(preview.total_score, 2.1);

    // Preview has no side effects
    let after = f.service.get_curation(&curator, curation.id).await.unwrap();
    assert_eq!(after.lock_version, b.new_version);
}

#[test]
fn test_preview_is_order_independent_and_reports_gaps() {
    let config = ScoringConfig::default();
    let forward = vec![
        entry(1, model_system(1)),
        entry(2, segregation(2.0)),
        entry(3, predicted_null(1, false).payload),
    ];
    let mut backward = forward.clone();
    backward.reverse();

    let a = gcur_engine::score_evidence(&forward, &config).unwrap();
    let b = gcur_engine::score_evidence(&backward, &config).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.total_score, 4.5);

    let with_gap = vec![
        entry(1, model_system(0)),
        entry(1, predicted_null(1, false).payload),
    ];
    let err = gcur_engine::score_evidence(&with_gap, &config).unwrap_err();
    let fields: Vec<&str> = err.issues.iter().map(|i| i.field.as_str()).collect();
    assert!(fields.contains(&"experiment_count"));
    assert!(fields.contains(&"id"));
}
