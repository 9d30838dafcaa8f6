//! Scoring configuration
//!
//! One `ScoringConfig` per curation schema. The default mirrors the ClinGen
//! gene-disease validity point scheme closely enough for curation work; scopes
//! that need a different scheme store their own under a schema id.

use super::evidence::{EvidenceCategory, EvidenceGroup, SequencingMethod};
use gcur_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default classification when no band threshold is met
pub const FALLBACK_CLASSIFICATION: &str = "No Known Disease Relationship";

/// Scoring rule for one evidence category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: EvidenceCategory,
    /// Points per proband (case-level) or per experiment (experimental)
    #[serde(default)]
    pub base_score: f64,
    /// Maximum contribution of the whole category
    pub cap: f64,
    #[serde(default)]
    pub de_novo_bonus: f64,
    #[serde(default)]
    pub functional_bonus: f64,
    /// Per-item ceiling (case-control studies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_item_points: Option<f64>,
}

/// One rung of a LOD-to-points ladder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LadderStep {
    pub min_lod: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegregationLadders {
    pub candidate_gene: Vec<LadderStep>,
    pub exome_genome: Vec<LadderStep>,
}

impl SegregationLadders {
    pub fn for_method(&self, method: SequencingMethod) -> &[LadderStep] {
        match method {
            SequencingMethod::CandidateGene => &self.candidate_gene,
            SequencingMethod::ExomeGenome => &self.exome_genome,
        }
    }
}

/// Classification band; the highest satisfied `min_score` wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationBand {
    pub label: String,
    pub min_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub name: String,
    pub categories: Vec<CategoryRule>,
    pub segregation_ladders: SegregationLadders,
    pub genetic_cap: f64,
    pub experimental_cap: f64,
    pub total_cap: f64,
    pub classifications: Vec<ClassificationBand>,
    #[serde(default = "default_fallback")]
    pub fallback_classification: String,
    /// Categories that must be present before a set is considered complete
    #[serde(default)]
    pub required_categories: Vec<EvidenceCategory>,
}

fn default_fallback() -> String {
    FALLBACK_CLASSIFICATION.to_string()
}

fn rule(category: EvidenceCategory, base_score: f64, cap: f64) -> CategoryRule {
    CategoryRule {
        category,
        base_score,
        cap,
        de_novo_bonus: 0.0,
        functional_bonus: 0.0,
        max_item_points: None,
    }
}

fn band(label: &str, min_score: f64) -> ClassificationBand {
    ClassificationBand {
        label: label.to_string(),
        min_score,
    }
}

fn step(min_lod: f64, points: f64) -> LadderStep {
    LadderStep { min_lod, points }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            categories: vec![
                CategoryRule {
                    de_novo_bonus: 0.5,
                    functional_bonus: 0.4,
                    ..rule(EvidenceCategory::CaseLevelPredictedNull, 1.5, 12.0)
                },
                CategoryRule {
                    de_novo_bonus: 0.4,
                    functional_bonus: 0.4,
                    ..rule(EvidenceCategory::CaseLevelOtherVariant, 0.1, 7.0)
                },
                rule(EvidenceCategory::Segregation, 0.0, 3.0),
                CategoryRule {
                    max_item_points: Some(6.0),
                    ..rule(EvidenceCategory::CaseControl, 0.0, 12.0)
                },
                rule(EvidenceCategory::ExperimentalFunction, 0.5, 2.0),
                rule(EvidenceCategory::FunctionalAlteration, 1.0, 2.0),
                rule(EvidenceCategory::ModelSystem, 2.0, 4.0),
                rule(EvidenceCategory::Rescue, 2.0, 4.0),
            ],
            segregation_ladders: SegregationLadders {
                candidate_gene: vec![step(2.0, 0.5), step(3.0, 1.0), step(5.0, 1.5)],
                exome_genome: vec![step(2.0, 1.0), step(3.0, 2.0), step(5.0, 3.0)],
            },
            genetic_cap: 12.0,
            experimental_cap: 6.0,
            total_cap: 18.0,
            classifications: vec![
                band("Strong", 12.0),
                band("Moderate", 7.0),
                band("Limited", 0.1),
            ],
            fallback_classification: default_fallback(),
            required_categories: Vec::new(),
        }
    }
}

impl ScoringConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ScoringConfig = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse scoring config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: ScoringConfig = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse scoring config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    pub fn rule(&self, category: EvidenceCategory) -> Option<&CategoryRule> {
        self.categories.iter().find(|r| r.category == category)
    }

    pub fn group_cap(&self, group: EvidenceGroup) -> f64 {
        match group {
            EvidenceGroup::Genetic => self.genetic_cap,
            EvidenceGroup::Experimental => self.experimental_cap,
        }
    }

    /// Reject configurations that would make scoring ambiguous
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.categories {
            if !seen.insert(rule.category) {
                return Err(Error::Config(format!(
                    "Duplicate rule for category '{}'",
                    rule.category
                )));
            }
            let values = [
                rule.base_score,
                rule.cap,
                rule.de_novo_bonus,
                rule.functional_bonus,
                rule.max_item_points.unwrap_or(0.0),
            ];
            if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(Error::Config(format!(
                    "Rule for category '{}' has a negative or non-finite value",
                    rule.category
                )));
            }
        }
        if let Some(missing) = EvidenceCategory::ALL.iter().find(|c| !seen.contains(*c)) {
            return Err(Error::Config(format!("Missing rule for category '{}'", missing)));
        }

        for (name, cap) in [
            ("genetic_cap", self.genetic_cap),
            ("experimental_cap", self.experimental_cap),
            ("total_cap", self.total_cap),
        ] {
            if !cap.is_finite() || cap < 0.0 {
                return Err(Error::Config(format!("{} must be a non-negative number", name)));
            }
        }

        for (name, ladder) in [
            ("candidate_gene", &self.segregation_ladders.candidate_gene),
            ("exome_genome", &self.segregation_ladders.exome_genome),
        ] {
            let thresholds: Vec<f64> = ladder.iter().map(|s| s.min_lod).collect();
            check_thresholds(&format!("segregation ladder '{}'", name), &thresholds)?;
        }

        if self.classifications.is_empty() {
            return Err(Error::Config("At least one classification band is required".to_string()));
        }
        let thresholds: Vec<f64> = self.classifications.iter().map(|b| b.min_score).collect();
        check_thresholds("classification ladder", &thresholds)?;

        Ok(())
    }
}

fn check_thresholds(what: &str, thresholds: &[f64]) -> Result<()> {
    if thresholds.iter().any(|t| !t.is_finite()) {
        return Err(Error::Config(format!("{} has a non-finite threshold", what)));
    }
    let mut sorted = thresholds.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(Error::Config(format!("{} has duplicate thresholds", what)));
    }
    Ok(())
}
