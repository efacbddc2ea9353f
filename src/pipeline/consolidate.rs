//! Recommendation consolidation: one non-redundant, correctly-prioritized
//! list of actionable blocks per claim.
//!
//! The policy evaluator and the clinical checker are maintained
//! independently and may name the same field under different spellings. The
//! alias table below is the single source of truth both UI surfaces share;
//! duplicating it per surface is how the suppression logic once diverged.

use crate::config::MAX_CLINICAL_RECOMMENDATIONS;
use crate::models::{ClinicalFlag, FieldName, FieldResult, UnifiedRecommendation};

/// Canonical field name ↔ known synonyms/aliases.
const FIELD_ALIASES: &[(FieldName, &[&str])] = &[
    (
        FieldName::Complaint,
        &[
            "chief_complaint",
            "chief_complaints",
            "chief complaint",
            "chief complaints",
            "complaints",
        ],
    ),
    (FieldName::Symptoms, &["symptom"]),
    (
        FieldName::Diagnosis,
        &["diagnosis_description", "diagnosis_code", "condition"],
    ),
    (
        FieldName::Lab,
        &[
            "laboratory",
            "lab_test",
            "test",
            "labs",
            "lab/investigations",
            "investigations",
        ],
    ),
    (
        FieldName::Pharmacy,
        &[
            "prescribed_medication",
            "medication",
            "drug",
            "medicine",
            "med",
        ],
    ),
];

/// Resolve a raw field name (either evaluator's spelling) to its canonical
/// field.
pub fn canonical_field(name: &str) -> Option<FieldName> {
    let norm = name.trim().to_lowercase();
    if let Some(field) = FieldName::from_str(&norm) {
        return Some(field);
    }
    FIELD_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&norm.as_str()))
        .map(|(field, _)| *field)
}

/// Merge multiple flags on the same (alias-normalized) field into one:
/// flagged items comma-joined in input order, recommendations unioned,
/// exact duplicates removed, capped.
///
/// Idempotent and order-independent at the group level; flags whose field
/// cannot be canonicalized group under their raw lowercased name.
pub fn merge_flags_by_field(flags: Vec<ClinicalFlag>) -> Vec<ClinicalFlag> {
    let mut groups: Vec<ClinicalFlag> = Vec::new();

    for flag in flags {
        let key = canonical_field(&flag.flagged_field)
            .map(|f| f.as_str().to_string())
            .unwrap_or_else(|| flag.flagged_field.trim().to_lowercase());

        if let Some(group) = groups.iter_mut().find(|g| g.flagged_field == key) {
            if !flag.flagged_item.is_empty() {
                if group.flagged_item.is_empty() {
                    group.flagged_item = flag.flagged_item;
                } else {
                    group.flagged_item.push_str(", ");
                    group.flagged_item.push_str(&flag.flagged_item);
                }
            }
            for rec in flag.recommendations {
                if !group.recommendations.contains(&rec) {
                    group.recommendations.push(rec);
                }
            }
            if group.reasoning.is_empty() {
                group.reasoning = flag.reasoning;
            }
        } else {
            let mut deduped = Vec::new();
            for rec in flag.recommendations {
                if !deduped.contains(&rec) {
                    deduped.push(rec);
                }
            }
            groups.push(ClinicalFlag {
                flagged_field: key,
                flagged_item: flag.flagged_item,
                recommendations: deduped,
                reasoning: flag.reasoning,
            });
        }
    }

    for group in &mut groups {
        group.recommendations.truncate(MAX_CLINICAL_RECOMMENDATIONS);
    }
    groups
}

/// True when a consolidated flag duplicates an existing policy exclusion:
/// same canonical field, or flagged-item text contained in the excluded
/// value (case-insensitive, either direction).
fn duplicates_policy_hit(flag: &ClinicalFlag, hit: &FieldResult) -> bool {
    if canonical_field(&flag.flagged_field) == Some(hit.field) {
        return true;
    }

    let item = flag.flagged_item.trim().to_lowercase();
    let value = hit.value.trim().to_lowercase();
    !item.is_empty() && !value.is_empty() && (value.contains(&item) || item.contains(&value))
}

/// Merge per-field exclusion results and clinical flags into unified
/// recommendation blocks.
///
/// Policy exclusions always win: a field flatly disallowed by policy must
/// not simultaneously present clinical "alternative medication" advice for
/// the same concept.
pub fn consolidate(
    field_results: &[FieldResult],
    clinical_flags: Vec<ClinicalFlag>,
) -> Vec<UnifiedRecommendation> {
    let merged = merge_flags_by_field(clinical_flags);

    let policy_hits: Vec<&FieldResult> = FieldName::all()
        .iter()
        .filter_map(|&f| field_results.iter().find(|r| r.field == f))
        .filter(|r| r.is_policy_hit())
        .collect();

    let mut unified: Vec<UnifiedRecommendation> = policy_hits
        .iter()
        .map(|hit| UnifiedRecommendation::PolicyExclusion((*hit).clone()))
        .collect();

    for flag in merged {
        if let Some(hit) = policy_hits.iter().find(|h| duplicates_policy_hit(&flag, h)) {
            tracing::debug!(
                flagged_field = %flag.flagged_field,
                policy_field = %hit.field,
                "Clinical flag suppressed by policy exclusion"
            );
            continue;
        }
        unified.push(UnifiedRecommendation::ClinicalLogic(flag));
    }

    unified
}

/// Clinical flags that survive consolidation against the given field
/// results. This is what the Scorer counts as unresolved.
pub fn surviving_flags(
    field_results: &[FieldResult],
    clinical_flags: Vec<ClinicalFlag>,
) -> Vec<ClinicalFlag> {
    consolidate(field_results, clinical_flags)
        .into_iter()
        .filter_map(|rec| match rec {
            UnifiedRecommendation::ClinicalLogic(flag) => Some(flag),
            UnifiedRecommendation::PolicyExclusion(_) => None,
        })
        .collect()
}
