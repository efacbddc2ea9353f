//! Full claim pipeline orchestrator.
//!
//! Coordinates: validate → evaluate fields → coherence check → consolidate
//! → score. Evaluator calls run sequentially (one oracle call at a time);
//! consolidation starts only after every call has settled or failed.

use crate::models::{ClaimFields, ClaimResult, Decision};

use super::coherence::CoherenceChecker;
use super::consolidate::{consolidate, surviving_flags};
use super::embedding::EmbeddingModel;
use super::evaluator::FieldEvaluator;
use super::index::PolicyIndex;
use super::oracle::Oracle;
use super::score;
use super::EvalError;
use crate::models::{FieldName, UnifiedRecommendation};

pub struct ClaimPipeline<'a, O: Oracle, E: EmbeddingModel> {
    oracle: &'a O,
    embedder: &'a E,
    index: &'a PolicyIndex,
}

impl<'a, O: Oracle, E: EmbeddingModel> ClaimPipeline<'a, O, E> {
    pub fn new(oracle: &'a O, embedder: &'a E, index: &'a PolicyIndex) -> Self {
        Self {
            oracle,
            embedder,
            index,
        }
    }

    /// Evaluate a single claim under the default case id.
    pub fn evaluate(&self, fields: &ClaimFields) -> Result<ClaimResult, EvalError> {
        self.evaluate_case("single_case", fields)
    }

    /// Evaluate one claim: every populated field against policy, the whole
    /// case for clinical coherence, then consolidation and scoring.
    pub fn evaluate_case(
        &self,
        case_id: &str,
        fields: &ClaimFields,
    ) -> Result<ClaimResult, EvalError> {
        if !fields.is_evaluable() {
            return Err(EvalError::InvalidClaim);
        }

        let evaluator = FieldEvaluator::new(self.oracle, self.embedder, self.index);
        let checker = CoherenceChecker::new(self.oracle);

        let mut field_results = Vec::new();
        let mut last_clause: Option<String> = None;

        for (field, value) in fields.present() {
            let evaluation = evaluator.evaluate(field, value, fields);
            if evaluation.matched_clause.is_some() {
                last_clause = evaluation.matched_clause;
            }
            field_results.push(evaluation.result);
        }

        let raw_flags = checker.check(fields, last_clause.as_deref());
        let clinical_flags = surviving_flags(&field_results, raw_flags);

        let mut policy_sources: Vec<String> = Vec::new();
        for result in &field_results {
            if result.policy_source != crate::config::NO_POLICY_SOURCE
                && result.policy_source != "Error"
                && !policy_sources.contains(&result.policy_source)
            {
                policy_sources.push(result.policy_source.clone());
            }
        }

        let mut result = ClaimResult {
            case_id: case_id.to_string(),
            final_decision: Decision::Allowed,
            approval_probability: 0,
            field_results,
            clinical_flags,
            policy_sources,
        };
        score::rescore(&mut result);

        tracing::info!(
            case_id,
            decision = %result.final_decision,
            score = result.approval_probability,
            flags = result.clinical_flags.len(),
            "Claim evaluated"
        );
        Ok(result)
    }

    /// Unified recommendation blocks for a result. Both UI surfaces call
    /// this; the alias and suppression logic behind it is shared, so
    /// identical input yields identical suppression everywhere.
    pub fn recommendations(&self, result: &ClaimResult) -> Vec<UnifiedRecommendation> {
        consolidate(&result.field_results, result.clinical_flags.clone())
    }

    /// Fresh policy-based alternatives for one excluded field. Idempotent;
    /// stored claim state is untouched.
    pub fn regenerate_field(
        &self,
        field: FieldName,
        value: &str,
        explanation: &str,
        fields: &ClaimFields,
    ) -> Vec<String> {
        let evaluator = FieldEvaluator::new(self.oracle, self.embedder, self.index);
        evaluator.regenerate(field, value, explanation, fields)
    }

    /// Fresh clinical alternatives for one flagged item. Idempotent;
    /// stored claim state is untouched.
    pub fn regenerate_clinical(
        &self,
        flagged_field: &str,
        flagged_item: &str,
        fields: &ClaimFields,
    ) -> Vec<String> {
        let checker = CoherenceChecker::new(self.oracle);
        checker.alternatives_for(flagged_field, flagged_item, fields)
    }
}
