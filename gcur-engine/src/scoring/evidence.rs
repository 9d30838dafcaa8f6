//! Evidence item types
//!
//! Evidence is a tagged union keyed by category. Each variant carries its own
//! payload struct, so a segregation item can never be read with the fields of
//! a case-level item. Required attributes are `Option` on the wire so that a
//! missing value becomes a validation issue instead of a parse failure.

use chrono::{DateTime, Utc};
use gcur_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Evidence category tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    CaseLevelPredictedNull,
    CaseLevelOtherVariant,
    Segregation,
    CaseControl,
    ExperimentalFunction,
    FunctionalAlteration,
    ModelSystem,
    Rescue,
}

/// Score group a category contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceGroup {
    Genetic,
    Experimental,
}

impl EvidenceCategory {
    pub const ALL: [EvidenceCategory; 8] = [
        EvidenceCategory::CaseLevelPredictedNull,
        EvidenceCategory::CaseLevelOtherVariant,
        EvidenceCategory::Segregation,
        EvidenceCategory::CaseControl,
        EvidenceCategory::ExperimentalFunction,
        EvidenceCategory::FunctionalAlteration,
        EvidenceCategory::ModelSystem,
        EvidenceCategory::Rescue,
    ];

    pub fn group(&self) -> EvidenceGroup {
        match self {
            EvidenceCategory::CaseLevelPredictedNull
            | EvidenceCategory::CaseLevelOtherVariant
            | EvidenceCategory::Segregation
            | EvidenceCategory::CaseControl => EvidenceGroup::Genetic,
            EvidenceCategory::ExperimentalFunction
            | EvidenceCategory::FunctionalAlteration
            | EvidenceCategory::ModelSystem
            | EvidenceCategory::Rescue => EvidenceGroup::Experimental,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceCategory::CaseLevelPredictedNull => "case_level_predicted_null",
            EvidenceCategory::CaseLevelOtherVariant => "case_level_other_variant",
            EvidenceCategory::Segregation => "segregation",
            EvidenceCategory::CaseControl => "case_control",
            EvidenceCategory::ExperimentalFunction => "experimental_function",
            EvidenceCategory::FunctionalAlteration => "functional_alteration",
            EvidenceCategory::ModelSystem => "model_system",
            EvidenceCategory::Rescue => "rescue",
        }
    }
}

impl fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EvidenceCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown evidence category: {}", s)))
    }
}

/// Case-level variant evidence (predicted null or other variant type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CaseLevelVariant {
    /// Required; at least 1
    pub proband_count: Option<u32>,
    #[serde(default)]
    pub de_novo: bool,
    #[serde(default)]
    pub functional_effect_confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencingMethod {
    CandidateGene,
    ExomeGenome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inheritance {
    Dominant,
    Recessive,
}

/// Upper bound on the individuals counted for one family
pub const MAX_FAMILY_COUNT: u32 = 1_000;

/// Raw family counts from which a LOD score is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegregationCounts {
    pub inheritance: Inheritance,
    /// Dominant: informative meioses; recessive: affected individuals
    pub affected_segregations: u32,
    /// Unaffected individuals (recessive only)
    #[serde(default)]
    pub unaffected: u32,
}

impl SegregationCounts {
    /// LOD score estimate
    ///
    /// Dominant: `n * log10(2)`. Recessive:
    /// `log10(1 / (0.25^(affected - 1) * 0.75^unaffected))`.
    pub fn lod(&self) -> f64 {
        match self.inheritance {
            Inheritance::Dominant => f64::from(self.affected_segregations) * 2f64.log10(),
            Inheritance::Recessive => {
                let affected = i32::try_from(self.affected_segregations.saturating_sub(1))
                    .unwrap_or(i32::MAX);
                let unaffected = i32::try_from(self.unaffected).unwrap_or(i32::MAX);
                let p = 0.25f64.powi(affected) * 0.75f64.powi(unaffected);
                (1.0 / p).log10()
            }
        }
    }
}

/// Segregation evidence for one family
///
/// Supplies either a published `lod_score` or raw `counts`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SegregationEvidence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_label: Option<String>,
    pub sequencing_method: Option<SequencingMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lod_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<SegregationCounts>,
}

impl SegregationEvidence {
    /// The LOD this family contributes, if exactly one source is present
    pub fn effective_lod(&self) -> Option<f64> {
        match (self.lod_score, self.counts) {
            (Some(lod), None) => Some(lod),
            (None, Some(counts)) => Some(counts.lod()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CaseControlStudy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_type: Option<String>,
    /// Required; points assigned by the curator for this study
    pub points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExperimentalEvidence {
    /// Required; at least 1
    pub experiment_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Category-tagged evidence payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum EvidencePayload {
    CaseLevelPredictedNull(CaseLevelVariant),
    CaseLevelOtherVariant(CaseLevelVariant),
    Segregation(SegregationEvidence),
    CaseControl(CaseControlStudy),
    ExperimentalFunction(ExperimentalEvidence),
    FunctionalAlteration(ExperimentalEvidence),
    ModelSystem(ExperimentalEvidence),
    Rescue(ExperimentalEvidence),
}

impl EvidencePayload {
    pub fn category(&self) -> EvidenceCategory {
        match self {
            EvidencePayload::CaseLevelPredictedNull(_) => EvidenceCategory::CaseLevelPredictedNull,
            EvidencePayload::CaseLevelOtherVariant(_) => EvidenceCategory::CaseLevelOtherVariant,
            EvidencePayload::Segregation(_) => EvidenceCategory::Segregation,
            EvidencePayload::CaseControl(_) => EvidenceCategory::CaseControl,
            EvidencePayload::ExperimentalFunction(_) => EvidenceCategory::ExperimentalFunction,
            EvidencePayload::FunctionalAlteration(_) => EvidenceCategory::FunctionalAlteration,
            EvidencePayload::ModelSystem(_) => EvidenceCategory::ModelSystem,
            EvidencePayload::Rescue(_) => EvidenceCategory::Rescue,
        }
    }
}

/// Per-item computed contribution (derived, never client-supplied)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemContribution {
    Points { points: f64 },
    /// Segregation items contribute a LOD; points come from the ladder
    LodScore { lod: f64, method: SequencingMethod },
}

/// One evidence item as handed to the scoring engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub id: Uuid,
    pub payload: EvidencePayload,
}

/// Client input for an upsert; `id: None` adds a new item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub payload: EvidencePayload,
}

/// Stored evidence item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: Uuid,
    pub curation_id: Uuid,
    pub payload: EvidencePayload,
    pub contribution: Option<ItemContribution>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl EvidenceItem {
    pub fn category(&self) -> EvidenceCategory {
        self.payload.category()
    }

    pub fn entry(&self) -> EvidenceEntry {
        EvidenceEntry {
            id: self.id,
            payload: self.payload.clone(),
        }
    }
}
