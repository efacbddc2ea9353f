//! Field Evaluator: one field value against the policy-exclusion corpus.
//!
//! Coordinates: normalize → retrieve → rule check → oracle decision →
//! recommend. Every failure path degrades locally; a field evaluation never
//! fails the claim.

use crate::config::{
    MAX_FIELD_RECOMMENDATIONS, NO_POLICY_SOURCE, RETRIEVAL_TOP_K, SIMILARITY_THRESHOLD,
};
use crate::models::{ClaimFields, Decision, FieldName, FieldResult};

use super::embedding::EmbeddingModel;
use super::index::{PolicyIndex, ScoredClause};
use super::oracle::Oracle;
use super::prompts::{
    exclusion_check_prompt, policy_alternatives_prompt, ADVISOR_SYSTEM_PROMPT,
    VERIFIER_SYSTEM_PROMPT,
};
use super::reply::parse_decision;
use super::rules::{clause_alternatives, normalize_brand_name, policy_rule_check, query_brand_terms};

/// A field evaluation plus the clause it matched, which downstream callers
/// reuse as context for the coherence check.
#[derive(Debug, Clone)]
pub struct FieldEvaluation {
    pub result: FieldResult,
    pub matched_clause: Option<String>,
}

pub struct FieldEvaluator<'a, O: Oracle, E: EmbeddingModel> {
    oracle: &'a O,
    embedder: &'a E,
    index: &'a PolicyIndex,
}

impl<'a, O: Oracle, E: EmbeddingModel> FieldEvaluator<'a, O, E> {
    pub fn new(oracle: &'a O, embedder: &'a E, index: &'a PolicyIndex) -> Self {
        Self {
            oracle,
            embedder,
            index,
        }
    }

    /// Evaluate one submitted field value. Empty values are the caller's
    /// responsibility to skip; this expects a non-blank value.
    pub fn evaluate(&self, field: FieldName, value: &str, fields: &ClaimFields) -> FieldEvaluation {
        let clause = match self.best_clause(field, value) {
            Ok(Some(clause)) => clause,
            Ok(None) => {
                // RetrievalMiss: no relevant policy, allowed by default
                return FieldEvaluation {
                    result: allowed(field, value, "No exclusion matched.", NO_POLICY_SOURCE),
                    matched_clause: None,
                };
            }
            Err(e) => {
                tracing::error!(field = %field, error = %e, "Retrieval failed, degrading field");
                return FieldEvaluation {
                    result: allowed(
                        field,
                        value,
                        &format!("Error during evaluation: {e}"),
                        "Error",
                    ),
                    matched_clause: None,
                };
            }
        };

        // Hard policy rules decide without the oracle
        if let Some((decision, explanation)) = policy_rule_check(value) {
            let recommendations = if decision == Decision::Excluded {
                self.recommend(field, value, &explanation, Some(&clause.text), fields)
            } else {
                Vec::new()
            };
            return FieldEvaluation {
                result: FieldResult {
                    field,
                    value: value.to_string(),
                    decision,
                    explanation,
                    policy_source: clause.source.clone(),
                    recommendations,
                },
                matched_clause: Some(clause.text),
            };
        }

        // Oracle decision against the matched clause
        let value_for_oracle = self.oracle_value_hint(field, value);
        let prompt = exclusion_check_prompt(field, &clause.text, &value_for_oracle);
        let reply = match self.oracle.classify(VERIFIER_SYSTEM_PROMPT, &prompt) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(field = %field, error = %e, "Oracle unavailable, degrading field");
                return FieldEvaluation {
                    result: allowed(
                        field,
                        value,
                        "Evaluation degraded: oracle unavailable, no exclusion applied.",
                        &clause.source,
                    ),
                    matched_clause: Some(clause.text),
                };
            }
        };

        let parsed = parse_decision(&reply);
        if !parsed.matched_phrase {
            tracing::warn!(
                field = %field,
                reply = %reply.chars().take(120).collect::<String>(),
                "Oracle reply matched no decision phrase, using token fallback"
            );
        }

        let recommendations = if parsed.decision == Decision::Excluded {
            self.recommend(field, value, &reply, Some(&clause.text), fields)
        } else {
            Vec::new()
        };

        FieldEvaluation {
            result: FieldResult {
                field,
                value: value.to_string(),
                decision: parsed.decision,
                explanation: reply,
                policy_source: clause.source.clone(),
                recommendations,
            },
            matched_clause: Some(clause.text),
        }
    }

    /// Regenerate policy-based alternatives for an excluded field.
    /// Idempotent and side-effect-free; the caller merges the fresh list
    /// into its own state.
    pub fn regenerate(
        &self,
        field: FieldName,
        value: &str,
        explanation: &str,
        fields: &ClaimFields,
    ) -> Vec<String> {
        let clause = self.best_clause(field, value).ok().flatten();
        self.recommend(field, value, explanation, clause.as_ref().map(|c| c.text.as_str()), fields)
    }

    /// The single most relevant policy clause, or None below the similarity
    /// threshold.
    fn best_clause(&self, field: FieldName, value: &str) -> Result<Option<ScoredClause>, super::EvalError> {
        let query_value = if field == FieldName::Pharmacy {
            normalize_brand_name(value)
        } else {
            value.to_string()
        };
        let query = format!("{}: {}", field.as_str(), query_value);
        let query_embedding = self.embedder.embed(&query)?;

        let candidates = self.index.search(&query_embedding, RETRIEVAL_TOP_K);

        // Re-rank: a clause naming the queried brand/strength wins outright
        let brand_terms = query_brand_terms(value);
        if !brand_terms.is_empty() {
            if let Some(hit) = candidates.iter().find(|c| {
                let lower = c.text.to_lowercase();
                brand_terms.iter().any(|t| lower.contains(t))
            }) {
                return Ok(Some(hit.clone()));
            }
        }

        Ok(candidates
            .into_iter()
            .next()
            .filter(|c| c.score > SIMILARITY_THRESHOLD))
    }

    /// Pharmacy values get a normalization hint so the oracle sees through
    /// brand misspellings.
    fn oracle_value_hint(&self, field: FieldName, value: &str) -> String {
        if field == FieldName::Pharmacy {
            let normalized = normalize_brand_name(value);
            if normalized != value.to_lowercase() {
                return format!("{value} (normalized: {normalized})");
            }
        }
        value.to_string()
    }

    /// Alternatives for an excluded value: clause-derived first, then the
    /// diagnosis-aware oracle, then field-type generic fallbacks.
    fn recommend(
        &self,
        field: FieldName,
        value: &str,
        explanation: &str,
        clause: Option<&str>,
        fields: &ClaimFields,
    ) -> Vec<String> {
        if let Some(clause) = clause {
            let mut extracted =
                clause_alternatives(field, value, clause, fields.get(FieldName::Diagnosis));
            if !extracted.is_empty() {
                extracted.truncate(MAX_FIELD_RECOMMENDATIONS);
                return extracted;
            }
        }

        let prompt = policy_alternatives_prompt(field, value, explanation, fields);
        match self
            .oracle
            .suggest(ADVISOR_SYSTEM_PROMPT, &prompt, MAX_FIELD_RECOMMENDATIONS)
        {
            Ok(recs) if !recs.is_empty() => recs,
            Ok(_) => {
                tracing::warn!(field = %field, "Oracle returned no parseable alternatives, using fallbacks");
                fallback_recommendations(field)
            }
            Err(e) => {
                tracing::error!(field = %field, error = %e, "Oracle unavailable for alternatives, using fallbacks");
                fallback_recommendations(field)
            }
        }
    }
}

/// Field-type-specific generic alternatives for when the oracle is down.
fn fallback_recommendations(field: FieldName) -> Vec<String> {
    match field {
        FieldName::Pharmacy => vec![
            "Standard formulary medication for the stated diagnosis".into(),
            "Submit with prior authorization and physician justification".into(),
        ],
        FieldName::Lab => vec![
            "Basic blood panel".into(),
            "Standard first-line diagnostic test for the stated diagnosis".into(),
        ],
        FieldName::Diagnosis => vec![
            "Standard diagnostic code for the presenting condition".into(),
            "Submit with physician documentation of medical necessity".into(),
        ],
        FieldName::Symptoms | FieldName::Complaint => vec![
            "Documented symptoms consistent with the stated diagnosis".into(),
            "Clinically relevant phrasing aligned with the diagnosis".into(),
        ],
    }
}

fn allowed(field: FieldName, value: &str, explanation: &str, source: &str) -> FieldResult {
    FieldResult {
        field,
        value: value.to_string(),
        decision: Decision::Allowed,
        explanation: explanation.to_string(),
        policy_source: source.to_string(),
        recommendations: Vec::new(),
    }
}
