//! Evidence scoring
//!
//! - `evidence`: category-tagged evidence payloads
//! - `config`: per-schema scoring configuration
//! - `validation`: structural validation gate
//! - `engine`: the pure scoring function

pub mod config;
pub mod engine;
pub mod evidence;
pub mod validation;

pub use config::{CategoryRule, ClassificationBand, LadderStep, ScoringConfig, SegregationLadders};
pub use engine::{
    classify, item_contribution, score, score_evidence, CategorySubtotal, ItemScore, ScoreResult,
    ScoreState,
};
pub use evidence::{
    CaseControlStudy, CaseLevelVariant, EvidenceCategory, EvidenceEntry, EvidenceGroup,
    EvidenceInput, EvidenceItem, EvidencePayload, ExperimentalEvidence, Inheritance,
    ItemContribution, SegregationCounts, SegregationEvidence, SequencingMethod,
};
pub use validation::{
    validate, validate_item, EvidenceValidationError, ValidatedEntry, ValidatedEvidence,
    ValidationIssue,
};
