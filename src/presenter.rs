//! Recommendation presenter: the apply/regenerate state machine behind the
//! batch-patient and single-claim views.
//!
//! Both surfaces build their items through the same consolidation call, so
//! identical input produces identical suppression on both. Apply mutates
//! the claim result in place and explicitly re-invokes the scorer; nothing
//! here re-runs the whole pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ClaimFields, ClaimResult, Decision, UnifiedRecommendation};
use crate::pipeline::consolidate::{canonical_field, consolidate};
use crate::pipeline::embedding::EmbeddingModel;
use crate::pipeline::oracle::Oracle;
use crate::pipeline::orchestrator::ClaimPipeline;
use crate::pipeline::score;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PresentError {
    #[error("Unknown recommendation item: {0}")]
    UnknownItem(Uuid),

    #[error("Item already applied")]
    AlreadyApplied,

    #[error("Apply requires at least one selected recommendation")]
    NoSelection,

    #[error("Applied field not present in claim result")]
    MissingField,
}

/// Per-item lifecycle. Applied is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationState {
    Pending,
    Applied,
}

impl RecommendationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Applied => "applied",
        }
    }
}

/// The two independently-rendered front-end surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Batch,
    SingleClaim,
}

/// One actionable block as shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentedItem {
    pub id: Uuid,
    pub state: RecommendationState,
    pub recommendation: UnifiedRecommendation,
}

/// View state for one claim on one surface.
#[derive(Debug, Clone)]
pub struct ClaimView {
    pub surface: Surface,
    pub items: Vec<PresentedItem>,
}

/// Outcome of an apply action, for the surface to refresh its header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub final_decision: Decision,
    pub approval_probability: u8,
}

impl ClaimView {
    /// Build the view from a claim result. Suppression runs through the
    /// shared consolidator regardless of surface.
    pub fn build(result: &ClaimResult, surface: Surface) -> Self {
        let items = consolidate(&result.field_results, result.clinical_flags.clone())
            .into_iter()
            .map(|recommendation| PresentedItem {
                id: Uuid::new_v4(),
                state: RecommendationState::Pending,
                recommendation,
            })
            .collect();
        Self { surface, items }
    }

    pub fn item(&self, id: Uuid) -> Option<&PresentedItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Apply selected recommendations for one item: flip the field to
    /// Allowed with an applied marker, rewrite the displayed value from the
    /// first selection, re-invoke the scorer, and retire the item.
    pub fn apply(
        &mut self,
        result: &mut ClaimResult,
        id: Uuid,
        selected: &[String],
    ) -> Result<ApplyOutcome, PresentError> {
        if selected.is_empty() {
            return Err(PresentError::NoSelection);
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(PresentError::UnknownItem(id))?;
        if item.state == RecommendationState::Applied {
            return Err(PresentError::AlreadyApplied);
        }

        let display_value = if selected.len() > 1 {
            format!("{} (+{} more selected)", selected[0], selected.len() - 1)
        } else {
            selected[0].clone()
        };

        match &item.recommendation {
            UnifiedRecommendation::PolicyExclusion(excluded) => {
                let field_result = result
                    .field_result_mut(excluded.field)
                    .ok_or(PresentError::MissingField)?;
                field_result.decision = Decision::Allowed;
                field_result.value = display_value;
                field_result.explanation.push_str(" (recommendation applied)");
            }
            UnifiedRecommendation::ClinicalLogic(flag) => {
                let canonical = canonical_field(&flag.flagged_field);
                let before = result.clinical_flags.len();
                result.clinical_flags.retain(|f| {
                    let same_item = f.flagged_item == flag.flagged_item;
                    let same_field =
                        canonical.is_some() && canonical_field(&f.flagged_field) == canonical;
                    !(same_item || same_field)
                });
                if result.clinical_flags.len() == before {
                    tracing::debug!(
                        flagged_field = %flag.flagged_field,
                        "Applied clinical item had no stored flag to resolve"
                    );
                }
            }
        }

        // Rescoring is explicit, not a side effect of the mutation above
        score::rescore(result);
        item.state = RecommendationState::Applied;

        Ok(ApplyOutcome {
            final_decision: result.final_decision,
            approval_probability: result.approval_probability,
        })
    }

    /// Swap in a fresh recommendation list for a pending item without
    /// touching its identity, its state, or any other item.
    pub fn regenerate<O: Oracle, E: EmbeddingModel>(
        &mut self,
        pipeline: &ClaimPipeline<'_, O, E>,
        fields: &ClaimFields,
        id: Uuid,
    ) -> Result<&[String], PresentError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(PresentError::UnknownItem(id))?;
        if item.state == RecommendationState::Applied {
            return Err(PresentError::AlreadyApplied);
        }

        match &mut item.recommendation {
            UnifiedRecommendation::PolicyExclusion(excluded) => {
                excluded.recommendations = pipeline.regenerate_field(
                    excluded.field,
                    &excluded.value,
                    &excluded.explanation,
                    fields,
                );
                Ok(&excluded.recommendations)
            }
            UnifiedRecommendation::ClinicalLogic(flag) => {
                flag.recommendations =
                    pipeline.regenerate_clinical(&flag.flagged_field, &flag.flagged_item, fields);
                Ok(&flag.recommendations)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClinicalFlag, FieldName, FieldResult};
    use crate::pipeline::embedding::HashEmbedder;
    use crate::pipeline::index::PolicyIndex;
    use crate::pipeline::oracle::ScriptedOracle;

    fn result_with_exclusion() -> ClaimResult {
        let mut result = ClaimResult {
            case_id: "single_case".into(),
            final_decision: Decision::Allowed,
            approval_probability: 0,
            field_results: vec![
                FieldResult {
                    field: FieldName::Diagnosis,
                    value: "Fever".into(),
                    decision: Decision::Allowed,
                    explanation: "No exclusion matched.".into(),
                    policy_source: "None".into(),
                    recommendations: vec![],
                },
                FieldResult {
                    field: FieldName::Pharmacy,
                    value: "Panadol".into(),
                    decision: Decision::Excluded,
                    explanation: "Excluded. Panadol is not covered.".into(),
                    policy_source: "FMC Insurance".into(),
                    recommendations: vec!["Adol 500 mg".into(), "Paracetamol generic".into()],
                },
            ],
            clinical_flags: vec![],
            policy_sources: vec!["FMC Insurance".into()],
        };
        score::rescore(&mut result);
        result
    }

    fn result_with_flag() -> ClaimResult {
        let mut result = ClaimResult {
            case_id: "single_case".into(),
            final_decision: Decision::Allowed,
            approval_probability: 0,
            field_results: vec![FieldResult {
                field: FieldName::Pharmacy,
                value: "levosiz-M".into(),
                decision: Decision::Allowed,
                explanation: "No exclusion matched.".into(),
                policy_source: "None".into(),
                recommendations: vec![],
            }],
            clinical_flags: vec![ClinicalFlag {
                flagged_field: "pharmacy".into(),
                flagged_item: "levosiz-M".into(),
                recommendations: vec!["Topical hemorrhoid cream".into()],
                reasoning: String::new(),
            }],
            policy_sources: vec![],
        };
        score::rescore(&mut result);
        result
    }

    #[test]
    fn both_surfaces_build_identical_suppression() {
        let mut result = result_with_exclusion();
        // A duplicate flag under an aliased field name: both surfaces must
        // suppress it through the same consolidation call
        result.clinical_flags.push(ClinicalFlag {
            flagged_field: "prescribed_medication".into(),
            flagged_item: "Panadol".into(),
            recommendations: vec!["anything".into()],
            reasoning: String::new(),
        });

        let batch = ClaimView::build(&result, Surface::Batch);
        let single = ClaimView::build(&result, Surface::SingleClaim);

        assert_eq!(batch.items.len(), 1);
        assert_eq!(single.items.len(), 1);
        assert_eq!(batch.items[0].recommendation.kind(), "policy_exclusion");
        assert_eq!(single.items[0].recommendation.kind(), "policy_exclusion");
        for (a, b) in batch.items.iter().zip(single.items.iter()) {
            assert_eq!(a.recommendation.recommendations(), b.recommendation.recommendations());
        }
    }

    #[test]
    fn apply_policy_item_flips_field_and_rescores() {
        let mut result = result_with_exclusion();
        assert_eq!(result.approval_probability, 80);

        let mut view = ClaimView::build(&result, Surface::SingleClaim);
        let id = view.items[0].id;
        let outcome = view
            .apply(&mut result, id, &["Adol 500 mg".into()])
            .unwrap();

        assert_eq!(outcome.final_decision, Decision::Allowed);
        assert_eq!(outcome.approval_probability, 100);

        let field = result.field_result(FieldName::Pharmacy).unwrap();
        assert_eq!(field.decision, Decision::Allowed);
        assert_eq!(field.value, "Adol 500 mg");
        assert!(field.explanation.ends_with("(recommendation applied)"));
        assert_eq!(view.items[0].state, RecommendationState::Applied);
    }

    #[test]
    fn apply_with_multiple_selections_notes_the_rest() {
        let mut result = result_with_exclusion();
        let mut view = ClaimView::build(&result, Surface::Batch);
        let id = view.items[0].id;

        view.apply(
            &mut result,
            id,
            &["Adol 500 mg".into(), "Paracetamol generic".into()],
        )
        .unwrap();

        let field = result.field_result(FieldName::Pharmacy).unwrap();
        assert_eq!(field.value, "Adol 500 mg (+1 more selected)");
    }

    #[test]
    fn apply_clinical_item_resolves_flag_and_rescores() {
        let mut result = result_with_flag();
        assert_eq!(result.approval_probability, 80);

        let mut view = ClaimView::build(&result, Surface::Batch);
        let id = view.items[0].id;
        let outcome = view
            .apply(&mut result, id, &["Topical hemorrhoid cream".into()])
            .unwrap();

        assert!(result.clinical_flags.is_empty());
        assert_eq!(outcome.approval_probability, 100);
        assert_eq!(outcome.final_decision, Decision::Allowed);
    }

    #[test]
    fn apply_is_terminal_per_item() {
        let mut result = result_with_exclusion();
        let mut view = ClaimView::build(&result, Surface::SingleClaim);
        let id = view.items[0].id;

        view.apply(&mut result, id, &["Adol 500 mg".into()]).unwrap();
        let err = view
            .apply(&mut result, id, &["Adol 500 mg".into()])
            .unwrap_err();
        assert_eq!(err, PresentError::AlreadyApplied);
    }

    #[test]
    fn apply_requires_a_selection() {
        let mut result = result_with_exclusion();
        let mut view = ClaimView::build(&result, Surface::SingleClaim);
        let id = view.items[0].id;

        let err = view.apply(&mut result, id, &[]).unwrap_err();
        assert_eq!(err, PresentError::NoSelection);
    }

    #[test]
    fn apply_unknown_item_is_rejected() {
        let mut result = result_with_exclusion();
        let mut view = ClaimView::build(&result, Surface::SingleClaim);

        let bogus = Uuid::new_v4();
        let err = view
            .apply(&mut result, bogus, &["x".into()])
            .unwrap_err();
        assert_eq!(err, PresentError::UnknownItem(bogus));
    }

    #[test]
    fn regenerate_replaces_list_but_keeps_identity_and_state() {
        let result = result_with_flag();
        let mut view = ClaimView::build(&result, Surface::SingleClaim);
        let id = view.items[0].id;

        let oracle = ScriptedOracle::always("- Sitz baths\n- Fiber supplementation");
        let embedder = HashEmbedder::new(16);
        let index = PolicyIndex::new();
        let pipeline = ClaimPipeline::new(&oracle, &embedder, &index);
        let fields = ClaimFields {
            diagnosis: Some("Piles".into()),
            pharmacy: Some("levosiz-M".into()),
            ..Default::default()
        };

        let recs = view.regenerate(&pipeline, &fields, id).unwrap().to_vec();
        assert_eq!(recs, vec!["Sitz baths", "Fiber supplementation"]);

        let item = view.item(id).unwrap();
        assert_eq!(item.state, RecommendationState::Pending);
        match &item.recommendation {
            UnifiedRecommendation::ClinicalLogic(flag) => {
                // Identity untouched, only the list contents changed
                assert_eq!(flag.flagged_field, "pharmacy");
                assert_eq!(flag.flagged_item, "levosiz-M");
                assert_eq!(flag.recommendations, recs);
            }
            other => panic!("Unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn regenerate_unavailable_after_apply() {
        let mut result = result_with_flag();
        let mut view = ClaimView::build(&result, Surface::SingleClaim);
        let id = view.items[0].id;
        view.apply(&mut result, id, &["x".into()]).unwrap();

        let oracle = ScriptedOracle::always("- anything");
        let embedder = HashEmbedder::new(16);
        let index = PolicyIndex::new();
        let pipeline = ClaimPipeline::new(&oracle, &embedder, &index);

        let err = view
            .regenerate(&pipeline, &ClaimFields::default(), id)
            .unwrap_err();
        assert_eq!(err, PresentError::AlreadyApplied);
    }
}
