//! Clinical Coherence Checker: are the submitted items clinically
//! consistent with the stated diagnosis?
//!
//! Policy coverage is a separate concern; this flags items that are
//! medically inappropriate regardless of what the formulary says. At most
//! one flag is surfaced per invocation, by fixed priority: a deliberate
//! simplification to avoid stacking simultaneous clinical warnings.

use crate::config::MAX_CLINICAL_RECOMMENDATIONS;
use crate::models::{ClaimFields, ClinicalFlag, FieldName};

use super::consolidate::{canonical_field, merge_flags_by_field};
use super::oracle::Oracle;
use super::prompts::{
    clinical_alternatives_prompt, clinical_case_prompt, CLINICAL_ADVISOR_SYSTEM_PROMPT,
    CLINICAL_SYSTEM_PROMPT,
};
use super::reply::{is_coherent_reply, parse_clinical_blocks};
use super::rules::duration_flag_check;

/// Flag priority when multiple fields would independently qualify:
/// complaint/symptom mismatches outrank lab and medication mismatches.
const FLAG_PRIORITY: &[FieldName] = &[
    FieldName::Complaint,
    FieldName::Symptoms,
    FieldName::Lab,
    FieldName::Pharmacy,
];

pub struct CoherenceChecker<'a, O: Oracle> {
    oracle: &'a O,
}

impl<'a, O: Oracle> CoherenceChecker<'a, O> {
    pub fn new(oracle: &'a O) -> Self {
        Self { oracle }
    }

    /// Check the claim for clinical inconsistencies. Returns at most one
    /// consolidated flag; an empty list on oracle failure is a safe
    /// degrade, logged so it stays distinguishable from a clean result.
    pub fn check(&self, fields: &ClaimFields, policy_excerpt: Option<&str>) -> Vec<ClinicalFlag> {
        if fields.get(FieldName::Diagnosis).is_none() {
            return Vec::new();
        }
        let has_other_field = FLAG_PRIORITY.iter().any(|&f| fields.get(f).is_some());
        if !has_other_field {
            return Vec::new();
        }

        // Deterministic duration rule fires without the oracle
        if let Some(flag) = duration_flag_check(fields) {
            tracing::info!(flagged_item = %flag.flagged_item, "Duration rule flagged pharmacy");
            return vec![flag];
        }

        let prompt = clinical_case_prompt(fields, policy_excerpt);
        let reply = match self.oracle.classify(CLINICAL_SYSTEM_PROMPT, &prompt) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Coherence oracle unavailable; returning no flags (degraded, not verified clean)"
                );
                return Vec::new();
            }
        };

        if is_coherent_reply(&reply) {
            return Vec::new();
        }

        let raw_flags = parse_clinical_blocks(&reply);
        if raw_flags.is_empty() {
            tracing::warn!(
                reply = %reply.chars().take(120).collect::<String>(),
                "Coherence reply matched neither sentinel nor flag format"
            );
            return Vec::new();
        }

        let merged = merge_flags_by_field(raw_flags);
        self.pick_priority_flag(merged)
    }

    /// Fresh alternatives for one already-flagged item. Idempotent and
    /// side-effect-free.
    pub fn alternatives_for(
        &self,
        flagged_field: &str,
        flagged_item: &str,
        fields: &ClaimFields,
    ) -> Vec<String> {
        let prompt = clinical_alternatives_prompt(flagged_field, flagged_item, fields);
        match self.oracle.suggest(
            CLINICAL_ADVISOR_SYSTEM_PROMPT,
            &prompt,
            MAX_CLINICAL_RECOMMENDATIONS,
        ) {
            Ok(recs) if !recs.is_empty() => recs,
            Ok(_) => fallback_alternatives(flagged_field, flagged_item),
            Err(e) => {
                tracing::warn!(error = %e, "Oracle unavailable for clinical alternatives, using fallbacks");
                fallback_alternatives(flagged_field, flagged_item)
            }
        }
    }

    /// Only the single highest-priority flag is surfaced per invocation.
    fn pick_priority_flag(&self, mut merged: Vec<ClinicalFlag>) -> Vec<ClinicalFlag> {
        if merged.is_empty() {
            return merged;
        }

        let chosen = FLAG_PRIORITY
            .iter()
            .find_map(|&priority| {
                merged
                    .iter()
                    .position(|f| canonical_field(&f.flagged_field) == Some(priority))
            })
            .unwrap_or(0);

        vec![merged.swap_remove(chosen)]
    }
}

fn fallback_alternatives(flagged_field: &str, flagged_item: &str) -> Vec<String> {
    vec![
        format!("Document medical necessity for {flagged_item}"),
        format!("Consider alternative {flagged_field} options that align with the diagnosis"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::oracle::ScriptedOracle;

    fn piles_case() -> ClaimFields {
        ClaimFields {
            complaint: Some("Stomach pain".into()),
            symptoms: Some("Abdominal discomfort".into()),
            diagnosis: Some("Piles".into()),
            lab: Some("Blood test".into()),
            pharmacy: Some("levosiz-M, dafflon".into()),
        }
    }

    #[test]
    fn no_diagnosis_means_no_check() {
        let oracle = ScriptedOracle::unreachable();
        let checker = CoherenceChecker::new(&oracle);
        let fields = ClaimFields {
            pharmacy: Some("levosiz-M".into()),
            ..Default::default()
        };
        assert!(checker.check(&fields, None).is_empty());
        assert!(oracle.seen_prompts().is_empty());
    }

    #[test]
    fn diagnosis_alone_means_no_check() {
        let oracle = ScriptedOracle::unreachable();
        let checker = CoherenceChecker::new(&oracle);
        let fields = ClaimFields {
            diagnosis: Some("Piles".into()),
            ..Default::default()
        };
        assert!(checker.check(&fields, None).is_empty());
    }

    #[test]
    fn coherent_reply_yields_no_flags() {
        let oracle = ScriptedOracle::always("All fields are clinically coherent. No flags raised.");
        let checker = CoherenceChecker::new(&oracle);
        assert!(checker.check(&piles_case(), None).is_empty());
    }

    #[test]
    fn selective_flagging_keeps_only_the_inappropriate_item() {
        // Pharmacy lists two drugs; only the antihistamine is wrong for
        // piles, and the reply flags exactly that item
        let oracle = ScriptedOracle::always(
            "Field: Pharmacy\nFlagged Item: levosiz-M\nAlternatives:\n- Topical hemorrhoid cream\n- Anti-inflammatory medication",
        );
        let checker = CoherenceChecker::new(&oracle);

        let flags = checker.check(&piles_case(), None);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].flagged_field, "pharmacy");
        assert_eq!(flags[0].flagged_item, "levosiz-M");
        assert!(!flags[0].flagged_item.contains("dafflon"));
    }

    #[test]
    fn highest_priority_flag_wins() {
        let oracle = ScriptedOracle::always(
            "Field: Pharmacy\nFlagged Item: levosiz-M\nAlternatives:\n- a\nField: Chief Complaints\nFlagged Item: Joint pain\nAlternatives:\n- b",
        );
        let checker = CoherenceChecker::new(&oracle);

        let flags = checker.check(&piles_case(), None);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].flagged_field, "complaint");
    }

    #[test]
    fn same_field_flags_consolidate_before_priority() {
        let oracle = ScriptedOracle::always(
            "Field: Pharmacy\nFlagged Item: levosiz-M\nAlternatives:\n- a\n- b\nField: Pharmacy\nFlagged Item: dafflon\nAlternatives:\n- b\n- c\n- d\n- e",
        );
        let checker = CoherenceChecker::new(&oracle);

        let flags = checker.check(&piles_case(), None);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].flagged_item, "levosiz-M, dafflon");
        // Union, exact-dedup, cap 3
        assert_eq!(flags[0].recommendations, vec!["a", "b", "c"]);
    }

    #[test]
    fn oracle_outage_degrades_to_empty() {
        let oracle = ScriptedOracle::unreachable();
        let checker = CoherenceChecker::new(&oracle);
        assert!(checker.check(&piles_case(), None).is_empty());
    }

    #[test]
    fn malformed_reply_degrades_to_empty() {
        let oracle = ScriptedOracle::always("Something unstructured about the case.");
        let checker = CoherenceChecker::new(&oracle);
        assert!(checker.check(&piles_case(), None).is_empty());
    }

    #[test]
    fn duration_rule_bypasses_oracle() {
        let oracle = ScriptedOracle::unreachable();
        let checker = CoherenceChecker::new(&oracle);
        let fields = ClaimFields {
            diagnosis: Some("Acute bronchitis".into()),
            pharmacy: Some("Amoxicillin 500 mg for 15 days".into()),
            ..Default::default()
        };

        let flags = checker.check(&fields, None);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].flagged_field, "pharmacy");
        assert!(flags[0].recommendations.iter().all(|r| r.contains("Amoxicillin")));
    }

    #[test]
    fn alternatives_for_scopes_to_the_item() {
        let oracle = ScriptedOracle::always("- Topical hemorrhoid cream\n- Sitz baths");
        let checker = CoherenceChecker::new(&oracle);

        let recs = checker.alternatives_for("pharmacy", "levosiz-M", &piles_case());
        assert_eq!(recs, vec!["Topical hemorrhoid cream", "Sitz baths"]);
        let prompts = oracle.seen_prompts();
        assert!(prompts[0].contains("levosiz-M"));
    }

    #[test]
    fn alternatives_fallback_when_oracle_down() {
        let oracle = ScriptedOracle::unreachable();
        let checker = CoherenceChecker::new(&oracle);

        let recs = checker.alternatives_for("pharmacy", "levosiz-M", &piles_case());
        assert_eq!(recs.len(), 2);
        assert!(recs[0].contains("levosiz-M"));
    }
}
