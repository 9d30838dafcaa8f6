//! Evidence Scoring Engine
//!
//! Pure and deterministic: no I/O, no clock, no randomness. Per-item
//! contributions are summed per category in a canonical (sorted) order so
//! that permuting the input cannot change a floating point result.
//!
//! # Algorithm
//! 1. Compute each item's contribution from its category rule
//! 2. Sum per category; segregation LODs are summed per sequencing method
//!    and converted to points through that method's ladder
//! 3. Cap each category, then each group (genetic, experimental), then the total
//! 4. Classify by the highest satisfied band threshold

use super::config::{CategoryRule, LadderStep, ScoringConfig};
use super::evidence::{
    EvidenceCategory, EvidenceEntry, EvidenceGroup, EvidencePayload, ItemContribution,
    SequencingMethod,
};
use super::validation::{validate, EvidenceValidationError, ValidatedEntry, ValidatedEvidence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySubtotal {
    pub category: EvidenceCategory,
    /// Sum before the category cap
    pub raw: f64,
    pub capped: f64,
    pub cap: f64,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemScore {
    pub item_id: Uuid,
    pub category: EvidenceCategory,
    pub contribution: ItemContribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// One entry per category that has evidence, in category order
    pub categories: Vec<CategorySubtotal>,
    pub genetic_total: f64,
    pub experimental_total: f64,
    pub total_score: f64,
    pub classification: String,
    /// Sorted by item id
    pub items: Vec<ItemScore>,
}

impl ScoreResult {
    pub fn subtotal(&self, category: EvidenceCategory) -> Option<&CategorySubtotal> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Score state recorded on a curation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ScoreState {
    Pending,
    Scored(ScoreResult),
    Incomplete(EvidenceValidationError),
}

impl ScoreState {
    /// Validate and score, recording incompleteness instead of failing
    pub fn evaluate(entries: &[EvidenceEntry], config: &ScoringConfig) -> Self {
        match score_evidence(entries, config) {
            Ok(result) => ScoreState::Scored(result),
            Err(err) => ScoreState::Incomplete(err),
        }
    }

    pub fn result(&self) -> Option<&ScoreResult> {
        match self {
            ScoreState::Scored(result) => Some(result),
            _ => None,
        }
    }
}

/// Round to two decimals; points are defined in tenths
fn round_points(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Order-independent sum
fn canonical_sum(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    values.iter().fold(0.0, |total, v| total + v)
}

fn ladder_points(ladder: &[LadderStep], lod: f64) -> f64 {
    let mut steps: Vec<&LadderStep> = ladder.iter().collect();
    steps.sort_by(|a, b| b.min_lod.total_cmp(&a.min_lod));
    steps
        .into_iter()
        .find(|s| lod >= s.min_lod)
        .map(|s| s.points)
        .unwrap_or(0.0)
}

/// Contribution of one validated item
///
/// Only called on validated entries, so required attributes are present.
pub fn item_contribution(payload: &EvidencePayload, rule: &CategoryRule) -> ItemContribution {
    let points = match payload {
        EvidencePayload::CaseLevelPredictedNull(v) | EvidencePayload::CaseLevelOtherVariant(v) => {
            let mut per_proband = rule.base_score;
            if v.de_novo {
                per_proband += rule.de_novo_bonus;
            }
            if v.functional_effect_confirmed {
                per_proband += rule.functional_bonus;
            }
            per_proband * f64::from(v.proband_count.unwrap_or(0))
        }
        EvidencePayload::Segregation(s) => {
            return ItemContribution::LodScore {
                lod: s.effective_lod().unwrap_or(0.0),
                method: s.sequencing_method.unwrap_or(SequencingMethod::CandidateGene),
            };
        }
        EvidencePayload::CaseControl(study) => {
            let points = study.points.unwrap_or(0.0);
            match rule.max_item_points {
                Some(max) => points.min(max),
                None => points,
            }
        }
        EvidencePayload::ExperimentalFunction(e)
        | EvidencePayload::FunctionalAlteration(e)
        | EvidencePayload::ModelSystem(e)
        | EvidencePayload::Rescue(e) => rule.base_score * f64::from(e.experiment_count.unwrap_or(0)),
    };
    ItemContribution::Points {
        points: round_points(points),
    }
}

/// Score a validated evidence set
///
/// Every entry carries the rule it was validated against, so no item is
/// skipped and no cap defaults to zero.
pub fn score(evidence: &ValidatedEvidence, config: &ScoringConfig) -> ScoreResult {
    let mut items = Vec::with_capacity(evidence.len());
    let mut by_category: BTreeMap<EvidenceCategory, (f64, Vec<ItemContribution>)> = BTreeMap::new();

    for ValidatedEntry { entry, rule } in evidence.entries() {
        let category = entry.payload.category();
        let contribution = item_contribution(&entry.payload, rule);
        by_category
            .entry(category)
            .or_insert_with(|| (rule.cap, Vec::new()))
            .1
            .push(contribution);
        items.push(ItemScore {
            item_id: entry.id,
            category,
            contribution,
        });
    }
    items.sort_by_key(|i| i.item_id);

    let mut categories = Vec::new();
    let mut genetic = Vec::new();
    let mut experimental = Vec::new();

    for (category, (cap, contributions)) in &by_category {
        let cap = *cap;
        let raw = if *category == EvidenceCategory::Segregation {
            segregation_points(contributions, config)
        } else {
            let mut points: Vec<f64> = contributions
                .iter()
                .filter_map(|c| match c {
                    ItemContribution::Points { points } => Some(*points),
                    ItemContribution::LodScore { .. } => None,
                })
                .collect();
            canonical_sum(&mut points)
        };
        let raw = round_points(raw);
        let capped = raw.min(cap);

        match category.group() {
            EvidenceGroup::Genetic => genetic.push(capped),
            EvidenceGroup::Experimental => experimental.push(capped),
        }
        categories.push(CategorySubtotal {
            category: *category,
            raw,
            capped,
            cap,
            item_count: contributions.len(),
        });
    }

    let genetic_total = round_points(canonical_sum(&mut genetic)).min(config.genetic_cap);
    let experimental_total =
        round_points(canonical_sum(&mut experimental)).min(config.experimental_cap);
    let total_score = round_points(genetic_total + experimental_total).min(config.total_cap);

    ScoreResult {
        categories,
        genetic_total,
        experimental_total,
        total_score,
        classification: classify(total_score, config),
        items,
    }
}

/// Sum LODs per sequencing method, then convert each through its ladder
fn segregation_points(contributions: &[ItemContribution], config: &ScoringConfig) -> f64 {
    let mut lods: BTreeMap<SequencingMethod, Vec<f64>> = BTreeMap::new();
    for contribution in contributions {
        if let ItemContribution::LodScore { lod, method } = contribution {
            lods.entry(*method).or_default().push(*lod);
        }
    }
    let mut points: Vec<f64> = lods
        .into_iter()
        .map(|(method, mut values)| {
            let total = canonical_sum(&mut values);
            ladder_points(config.segregation_ladders.for_method(method), total)
        })
        .collect();
    canonical_sum(&mut points)
}

/// Highest satisfied band wins; bands are checked from the top down
pub fn classify(total_score: f64, config: &ScoringConfig) -> String {
    let mut bands: Vec<_> = config.classifications.iter().collect();
    bands.sort_by(|a, b| b.min_score.total_cmp(&a.min_score));
    bands
        .into_iter()
        .find(|b| total_score >= b.min_score)
        .map(|b| b.label.clone())
        .unwrap_or_else(|| config.fallback_classification.clone())
}

/// Validate then score; the standalone preview entry point
pub fn score_evidence(
    entries: &[EvidenceEntry],
    config: &ScoringConfig,
) -> Result<ScoreResult, EvidenceValidationError> {
    let validated = validate(entries, config)?;
    Ok(score(&validated, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::evidence::{
        CaseControlStudy, CaseLevelVariant, ExperimentalEvidence, Inheritance, SegregationCounts,
        SegregationEvidence,
    };

    fn entry(payload: EvidencePayload) -> EvidenceEntry {
        EvidenceEntry {
            id: Uuid::new_v4(),
            payload,
        }
    }

    fn predicted_null(probands: u32, de_novo: bool) -> EvidenceEntry {
        entry(EvidencePayload::CaseLevelPredictedNull(CaseLevelVariant {
            proband_count: Some(probands),
            de_novo,
            ..Default::default()
        }))
    }

    fn missense(probands: u32) -> EvidenceEntry {
        entry(EvidencePayload::CaseLevelOtherVariant(CaseLevelVariant {
            proband_count: Some(probands),
            variant: Some("c.235G>A".to_string()),
            ..Default::default()
        }))
    }

    fn experiment(payload: fn(ExperimentalEvidence) -> EvidencePayload, count: u32) -> EvidenceEntry {
        entry(payload(ExperimentalEvidence {
            experiment_count: Some(count),
            description: None,
        }))
    }

    fn segregation(method: SequencingMethod, lod: f64) -> EvidenceEntry {
        entry(EvidencePayload::Segregation(SegregationEvidence {
            sequencing_method: Some(method),
            lod_score: Some(lod),
            ..Default::default()
        }))
    }

    #[test]
    fn test_de_novo_bonus_per_proband() {
        let config = ScoringConfig::default();
        let result = score_evidence(&[predicted_null(3, true)], &config).unwrap();
        let subtotal = result.subtotal(EvidenceCategory::CaseLevelPredictedNull).unwrap();
        assert_eq!(subtotal.raw, 6.0);
        assert_eq!(subtotal.capped, 6.0);
        assert_eq!(result.total_score, 6.0);
        assert_eq!(result.classification, "Limited");
    }

    #[test]
    fn test_category_cap_applies() {
        let config = ScoringConfig::default();
        let entries: Vec<_> = (0..5).map(|_| predicted_null(2, true)).collect();
        let result = score_evidence(&entries, &config).unwrap();
        let subtotal = result.subtotal(EvidenceCategory::CaseLevelPredictedNull).unwrap();
        assert_eq!(subtotal.raw, 20.0);
        assert_eq!(subtotal.capped, 12.0);
        assert_eq!(result.genetic_total, 12.0);
        assert_eq!(result.classification, "Strong");
    }

    #[test]
    fn test_group_and_total_caps_apply() {
        let config = ScoringConfig::default();
        let mut entries: Vec<_> = (0..5).map(|_| predicted_null(2, true)).collect();
        entries.push(experiment(EvidencePayload::ModelSystem, 3));
        entries.push(experiment(EvidencePayload::Rescue, 3));
        let result = score_evidence(&entries, &config).unwrap();
        assert_eq!(result.subtotal(EvidenceCategory::ModelSystem).unwrap().capped, 4.0);
        assert_eq!(result.experimental_total, 6.0);
        assert_eq!(result.total_score, 18.0);
    }

    #[test]
    fn test_order_invariance() {
        let config = ScoringConfig::default();
        let entries = vec![
            predicted_null(1, true),
            missense(3),
            experiment(EvidencePayload::ExperimentalFunction, 1),
            segregation(SequencingMethod::ExomeGenome, 1.7),
            segregation(SequencingMethod::ExomeGenome, 1.4),
            entry(EvidencePayload::CaseControl(CaseControlStudy {
                study_type: None,
                points: Some(0.7),
            })),
        ];
        let forward = score_evidence(&entries, &config).unwrap();
        let mut reversed = entries.clone();
        reversed.reverse();
        let backward = score_evidence(&reversed, &config).unwrap();
        let mut rotated = entries.clone();
        rotated.rotate_left(2);
        let rotated = score_evidence(&rotated, &config).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
    }

    #[test]
    fn test_scenario_predicted_null_and_missense() {
        let config = ScoringConfig::default();
        let result = score_evidence(&[predicted_null(1, true), missense(1)], &config).unwrap();
        assert_eq!(result.total_score, 2.1);
        assert_eq!(result.classification, "Limited");
        assert_eq!(result.items.len(), 2);
    }

    #[test]
    fn test_segregation_lods_summed_before_ladder() {
        let config = ScoringConfig::default();
        // 1.7 + 1.4 = 3.1 on exome: 2 points; neither alone reaches 2.0
        let result = score_evidence(
            &[
                segregation(SequencingMethod::ExomeGenome, 1.7),
                segregation(SequencingMethod::ExomeGenome, 1.4),
            ],
            &config,
        )
        .unwrap();
        assert_eq!(result.subtotal(EvidenceCategory::Segregation).unwrap().raw, 2.0);
    }

    #[test]
    fn test_segregation_counts_derive_lod() {
        let config = ScoringConfig::default();
        let counted = entry(EvidencePayload::Segregation(SegregationEvidence {
            family_label: Some("F1".to_string()),
            sequencing_method: Some(SequencingMethod::CandidateGene),
            lod_score: None,
            counts: Some(SegregationCounts {
                inheritance: Inheritance::Dominant,
                affected_segregations: 10,
                unaffected: 0,
            }),
        }));
        let result = score_evidence(&[counted], &config).unwrap();
        // LOD 3.01 on candidate gene: 1 point
        assert_eq!(result.subtotal(EvidenceCategory::Segregation).unwrap().raw, 1.0);
    }

    #[test]
    fn test_case_control_item_ceiling() {
        let config = ScoringConfig::default();
        let study = entry(EvidencePayload::CaseControl(CaseControlStudy {
            study_type: Some("single_variant".to_string()),
            points: Some(9.0),
        }));
        let result = score_evidence(&[study], &config).unwrap();
        assert_eq!(result.total_score, 6.0);
    }

    #[test]
    fn test_classification_ladder_highest_first() {
        let config = ScoringConfig::default();
        assert_eq!(classify(12.0, &config), "Strong");
        assert_eq!(classify(11.99, &config), "Moderate");
        assert_eq!(classify(7.0, &config), "Moderate");
        assert_eq!(classify(0.1, &config), "Limited");
        assert_eq!(classify(0.0, &config), "No Known Disease Relationship");
    }

    #[test]
    fn test_category_without_rule_is_not_dropped() {
        let mut config = ScoringConfig::default();
        config
            .categories
            .retain(|r| r.category != EvidenceCategory::CaseLevelPredictedNull);
        let err = score_evidence(&[predicted_null(3, true)], &config).unwrap_err();
        assert_eq!(err.issues[0].field, "category");
        assert!(matches!(
            ScoreState::evaluate(&[predicted_null(3, true)], &config),
            ScoreState::Incomplete(_)
        ));
    }

    #[test]
    fn test_empty_group_totals_are_positive_zero() {
        let config = ScoringConfig::default();
        let result =
            score_evidence(&[experiment(EvidencePayload::ModelSystem, 1)], &config).unwrap();
        assert_eq!(result.genetic_total, 0.0);
        assert!(result.genetic_total.is_sign_positive());
        assert!(result.experimental_total.is_sign_positive());
        assert!(result.total_score.is_sign_positive());
    }

    #[test]
    fn test_invalid_set_is_never_scored() {
        let config = ScoringConfig::default();
        let bad = entry(EvidencePayload::CaseLevelPredictedNull(CaseLevelVariant::default()));
        let state = ScoreState::evaluate(&[predicted_null(1, false), bad], &config);
        assert!(matches!(state, ScoreState::Incomplete(_)));
        assert!(state.result().is_none());
    }
}
