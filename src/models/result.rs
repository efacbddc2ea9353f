//! Evaluation output types.
//!
//! These model the full result lifecycle:
//! Field Evaluator → Coherence Checker → Consolidator → Scorer → Presenter.

use serde::{Deserialize, Serialize};

use super::claim::FieldName;

/// Outcome of evaluating one field (or one batch row).
///
/// `Error` never appears on an individual field result; it marks batch rows
/// whose whole-claim evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Decision {
    Allowed,
    Excluded,
    Error,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "Allowed",
            Self::Excluded => "Excluded",
            Self::Error => "Error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Allowed" => Some(Self::Allowed),
            "Excluded" => Some(Self::Excluded),
            "Error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-field evaluation result from the Field Evaluator.
///
/// Immutable once produced, except that a regenerate request replaces
/// `recommendations` and an apply action flips `decision` to Allowed with an
/// applied marker on the explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldResult {
    pub field: FieldName,
    pub value: String,
    pub decision: Decision,
    pub explanation: String,
    pub policy_source: String,
    /// Populated only when the decision is Excluded; at most two entries.
    pub recommendations: Vec<String>,
}

impl FieldResult {
    /// An excluded field with actionable alternatives: the unit the
    /// Consolidator promotes to a PolicyExclusion recommendation.
    pub fn is_policy_hit(&self) -> bool {
        self.decision == Decision::Excluded && !self.recommendations.is_empty()
    }
}

/// One clinically-inappropriate item found by the Coherence Checker.
///
/// `flagged_field` is kept as raw text: the checker and external callers may
/// name the same field under different spellings ("pharmacy",
/// "prescribed_medication", "Lab/Investigations"). Canonicalization is the
/// Consolidator's job, via the shared alias table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalFlag {
    pub flagged_field: String,
    /// May be a sub-item of the field value, e.g. one drug of several listed.
    pub flagged_item: String,
    /// One to three diagnosis-appropriate alternatives.
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
}

/// The Presenter's output unit: one actionable recommendation block.
///
/// Invariant: after consolidation no field appears both as a PolicyExclusion
/// and as a ClinicalLogic entry; policy exclusions always win.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnifiedRecommendation {
    PolicyExclusion(FieldResult),
    ClinicalLogic(ClinicalFlag),
}

impl UnifiedRecommendation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PolicyExclusion(_) => "policy_exclusion",
            Self::ClinicalLogic(_) => "clinical_logic",
        }
    }

    pub fn recommendations(&self) -> &[String] {
        match self {
            Self::PolicyExclusion(r) => &r.recommendations,
            Self::ClinicalLogic(f) => &f.recommendations,
        }
    }
}

/// Aggregate result for one claim.
///
/// Built once per evaluation; apply actions mutate it in place (decision
/// flips, score recomputed) but never rebuild it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResult {
    pub case_id: String,
    pub final_decision: Decision,
    /// Flat-deduction approval score, 0–100. Not a true probability.
    pub approval_probability: u8,
    /// One entry per submitted field, in processing order.
    pub field_results: Vec<FieldResult>,
    /// Consolidated, non-suppressed clinical flags.
    pub clinical_flags: Vec<ClinicalFlag>,
    pub policy_sources: Vec<String>,
}

impl ClaimResult {
    pub fn field_result(&self, field: FieldName) -> Option<&FieldResult> {
        self.field_results.iter().find(|r| r.field == field)
    }

    pub fn field_result_mut(&mut self, field: FieldName) -> Option<&mut FieldResult> {
        self.field_results.iter_mut().find(|r| r.field == field)
    }

    pub fn has_excluded_field(&self) -> bool {
        self.field_results
            .iter()
            .any(|r| r.decision == Decision::Excluded)
    }
}
