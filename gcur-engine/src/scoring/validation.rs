//! Structural validation of evidence
//!
//! Scoring only accepts a `ValidatedEvidence`, which can only be built here,
//! so an invalid set can never reach the arithmetic.

use super::config::{CategoryRule, ScoringConfig};
use super::evidence::{EvidenceCategory, EvidenceEntry, EvidencePayload, MAX_FAMILY_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// One structural problem in an evidence set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// `None` for set-level issues
    pub item_id: Option<Uuid>,
    pub category: Option<EvidenceCategory>,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn item(entry: &EvidenceEntry, field: &str, message: impl Into<String>) -> Self {
        Self {
            item_id: Some(entry.id),
            category: Some(entry.payload.category()),
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.item_id, self.category) {
            (Some(id), Some(category)) => {
                write!(f, "item {} ({}): {}: {}", id, category, self.field, self.message)
            }
            _ => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Evidence set rejected before scoring
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, thiserror::Error)]
#[error("{}", summary(.issues, .missing_categories))]
pub struct EvidenceValidationError {
    pub issues: Vec<ValidationIssue>,
    pub missing_categories: Vec<EvidenceCategory>,
}

fn summary(issues: &[ValidationIssue], missing: &[EvidenceCategory]) -> String {
    let mut parts: Vec<String> = issues.iter().map(ToString::to_string).collect();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(EvidenceCategory::as_str).collect();
        parts.push(format!("missing required categories: {}", names.join(", ")));
    }
    parts.join("; ")
}

impl EvidenceValidationError {
    /// Set-level issue for a curation with no evidence at all
    pub fn no_evidence() -> Self {
        Self {
            issues: vec![ValidationIssue {
                item_id: None,
                category: None,
                field: "evidence".to_string(),
                message: "no evidence recorded".to_string(),
            }],
            missing_categories: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.missing_categories.is_empty()
    }
}

/// Entry paired with the rule that scores it
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntry {
    pub entry: EvidenceEntry,
    pub rule: CategoryRule,
}

/// Evidence set that passed structural validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvidence {
    entries: Vec<ValidatedEntry>,
}

impl ValidatedEvidence {
    pub fn entries(&self) -> &[ValidatedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_count(entry: &EvidenceEntry, field: &str, value: Option<u32>, out: &mut Vec<ValidationIssue>) {
    match value {
        None => out.push(ValidationIssue::item(entry, field, "required")),
        Some(0) => out.push(ValidationIssue::item(entry, field, "must be at least 1")),
        Some(_) => {}
    }
}

/// Issues with a single item's required attributes
pub fn item_issues(entry: &EvidenceEntry) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    match &entry.payload {
        EvidencePayload::CaseLevelPredictedNull(v) | EvidencePayload::CaseLevelOtherVariant(v) => {
            check_count(entry, "proband_count", v.proband_count, &mut issues);
        }
        EvidencePayload::Segregation(s) => {
            if s.sequencing_method.is_none() {
                issues.push(ValidationIssue::item(entry, "sequencing_method", "required"));
            }
            match (s.lod_score, s.counts) {
                (Some(_), Some(_)) => issues.push(ValidationIssue::item(
                    entry,
                    "lod_score",
                    "supply either lod_score or counts, not both",
                )),
                (None, None) => issues.push(ValidationIssue::item(
                    entry,
                    "lod_score",
                    "either lod_score or counts is required",
                )),
                (Some(lod), None) if !lod.is_finite() || lod < 0.0 => issues.push(
                    ValidationIssue::item(entry, "lod_score", "must be a non-negative number"),
                ),
                (None, Some(counts)) => {
                    if counts.affected_segregations == 0 {
                        issues.push(ValidationIssue::item(
                            entry,
                            "counts.affected_segregations",
                            "must be at least 1",
                        ));
                    }
                    for (field, value) in [
                        ("counts.affected_segregations", counts.affected_segregations),
                        ("counts.unaffected", counts.unaffected),
                    ] {
                        if value > MAX_FAMILY_COUNT {
                            issues.push(ValidationIssue::item(
                                entry,
                                field,
                                format!("must be at most {}", MAX_FAMILY_COUNT),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }
        EvidencePayload::CaseControl(study) => match study.points {
            None => issues.push(ValidationIssue::item(entry, "points", "required")),
            Some(p) if !p.is_finite() || p < 0.0 => issues.push(ValidationIssue::item(
                entry,
                "points",
                "must be a non-negative number",
            )),
            Some(_) => {}
        },
        EvidencePayload::ExperimentalFunction(e)
        | EvidencePayload::FunctionalAlteration(e)
        | EvidencePayload::ModelSystem(e)
        | EvidencePayload::Rescue(e) => {
            check_count(entry, "experiment_count", e.experiment_count, &mut issues);
        }
    }
    issues
}

/// Validate one item in isolation (used when an item is added or edited)
pub fn validate_item(entry: &EvidenceEntry) -> Result<(), EvidenceValidationError> {
    let issues = item_issues(entry);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(EvidenceValidationError {
            issues,
            missing_categories: Vec::new(),
        })
    }
}

/// Validate a whole evidence set against a scoring configuration
///
/// An empty set is incomplete: there is nothing to classify.
pub fn validate(
    entries: &[EvidenceEntry],
    config: &ScoringConfig,
) -> Result<ValidatedEvidence, EvidenceValidationError> {
    let mut error = if entries.is_empty() {
        EvidenceValidationError::no_evidence()
    } else {
        EvidenceValidationError::default()
    };

    let mut ids = BTreeSet::new();
    let mut validated = Vec::with_capacity(entries.len());
    for entry in entries {
        if !ids.insert(entry.id) {
            error
                .issues
                .push(ValidationIssue::item(entry, "id", "duplicate evidence item id"));
        }
        error.issues.extend(item_issues(entry));
        match config.rule(entry.payload.category()) {
            Some(rule) => validated.push(ValidatedEntry {
                entry: entry.clone(),
                rule: rule.clone(),
            }),
            None => error.issues.push(ValidationIssue::item(
                entry,
                "category",
                "no scoring rule configured for this category",
            )),
        }
    }

    let present: BTreeSet<EvidenceCategory> =
        entries.iter().map(|e| e.payload.category()).collect();
    let required: BTreeSet<EvidenceCategory> = config.required_categories.iter().copied().collect();
    error.missing_categories = required.difference(&present).copied().collect();

    if error.is_empty() {
        Ok(ValidatedEvidence { entries: validated })
    } else {
        Err(error)
    }
}
