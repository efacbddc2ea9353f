//! Wire-level request/response types and the thin service layer over the
//! pipeline. The HTTP carrier is out of scope; these types are the
//! observable contract a server would serialize.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{ClaimFields, ClaimResult, ClinicalFlag, Decision};
use crate::pipeline::consolidate::canonical_field;
use crate::pipeline::embedding::EmbeddingModel;
use crate::pipeline::oracle::Oracle;
use crate::pipeline::orchestrator::ClaimPipeline;
use crate::pipeline::EvalError;

/// A single-claim evaluation request. All fields optional, at least one
/// required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub complaint: Option<String>,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub lab: Option<String>,
    pub pharmacy: Option<String>,
}

impl ClaimRequest {
    pub fn to_fields(&self) -> ClaimFields {
        ClaimFields {
            complaint: self.complaint.clone(),
            symptoms: self.symptoms.clone(),
            diagnosis: self.diagnosis.clone(),
            lab: self.lab.clone(),
            pharmacy: self.pharmacy.clone(),
        }
    }
}

/// Per-field entry of the evaluation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldBreakdown {
    pub field: String,
    pub value: String,
    /// Kept under both names for front-end compatibility.
    pub result: Decision,
    pub decision: Decision,
    pub explanation: String,
    pub policy_source: String,
    pub probability: u8,
    pub recommendations: Vec<String>,
}

/// Full evaluation response for one claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub case_id: String,
    pub final_decision: Decision,
    pub approval_probability: u8,
    pub field_breakdown: BTreeMap<String, FieldBreakdown>,
    pub clinical_flags: Vec<ClinicalFlag>,
    pub policy_sources: Vec<String>,
}

impl From<ClaimResult> for ClaimResponse {
    fn from(result: ClaimResult) -> Self {
        let field_breakdown = result
            .field_results
            .iter()
            .map(|r| {
                let probability = if r.decision == Decision::Excluded { 0 } else { 100 };
                (
                    r.field.as_str().to_string(),
                    FieldBreakdown {
                        field: r.field.as_str().to_string(),
                        value: r.value.clone(),
                        result: r.decision,
                        decision: r.decision,
                        explanation: r.explanation.clone(),
                        policy_source: r.policy_source.clone(),
                        probability,
                        recommendations: r.recommendations.clone(),
                    },
                )
            })
            .collect();

        Self {
            case_id: result.case_id,
            final_decision: result.final_decision,
            approval_probability: result.approval_probability,
            field_breakdown,
            clinical_flags: result.clinical_flags,
            policy_sources: result.policy_sources,
        }
    }
}

/// Regenerate policy-based alternatives for one excluded field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerateFieldRequest {
    pub field_name: String,
    pub value: String,
    pub explanation: String,
    #[serde(default)]
    pub policy_source: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub complaint: Option<String>,
    #[serde(default)]
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerateFieldResponse {
    pub field_name: String,
    pub value: String,
    pub recommendations: Vec<String>,
}

/// Regenerate clinical alternatives for one flagged item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerateClinicalRequest {
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub complaint: Option<String>,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub lab: Option<String>,
    #[serde(default)]
    pub pharmacy: Option<String>,
    pub flagged_field: String,
    pub flagged_item: String,
}

impl RegenerateClinicalRequest {
    fn to_fields(&self) -> ClaimFields {
        ClaimFields {
            complaint: self.complaint.clone(),
            symptoms: self.symptoms.clone(),
            diagnosis: self.diagnosis.clone(),
            lab: self.lab.clone(),
            pharmacy: self.pharmacy.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerateClinicalResponse {
    pub flagged_field: String,
    pub flagged_item: String,
    pub recommendations: Vec<String>,
}

/// Evaluate one claim. Rejects a request with no populated fields, which is
/// distinct from a claim whose fields are all Allowed.
pub fn verify_claim<O: Oracle, E: EmbeddingModel>(
    pipeline: &ClaimPipeline<'_, O, E>,
    request: &ClaimRequest,
) -> Result<ClaimResponse, EvalError> {
    let fields = request.to_fields();
    let result = pipeline.evaluate(&fields)?;
    Ok(result.into())
}

/// Regenerate field alternatives. Idempotent, side-effect-free; the caller
/// merges the new list into its own UI state.
pub fn regenerate_field_recommendations<O: Oracle, E: EmbeddingModel>(
    pipeline: &ClaimPipeline<'_, O, E>,
    request: &RegenerateFieldRequest,
) -> Result<RegenerateFieldResponse, EvalError> {
    let field = canonical_field(&request.field_name)
        .ok_or_else(|| EvalError::UnknownField(request.field_name.clone()))?;

    let context = ClaimFields {
        complaint: request.complaint.clone(),
        symptoms: request.symptoms.clone(),
        diagnosis: request.diagnosis.clone(),
        ..Default::default()
    };

    let recommendations =
        pipeline.regenerate_field(field, &request.value, &request.explanation, &context);

    Ok(RegenerateFieldResponse {
        field_name: field.as_str().to_string(),
        value: request.value.clone(),
        recommendations,
    })
}

/// Regenerate clinical alternatives. Idempotent, side-effect-free.
pub fn regenerate_clinical_recommendations<O: Oracle, E: EmbeddingModel>(
    pipeline: &ClaimPipeline<'_, O, E>,
    request: &RegenerateClinicalRequest,
) -> RegenerateClinicalResponse {
    let fields = request.to_fields();
    let recommendations =
        pipeline.regenerate_clinical(&request.flagged_field, &request.flagged_item, &fields);

    RegenerateClinicalResponse {
        flagged_field: request.flagged_field.clone(),
        flagged_item: request.flagged_item.clone(),
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::embedding::HashEmbedder;
    use crate::pipeline::index::PolicyIndex;
    use crate::pipeline::oracle::ScriptedOracle;

    fn piles_request() -> ClaimRequest {
        ClaimRequest {
            complaint: Some("Stomach pain".into()),
            symptoms: Some("Abdominal discomfort".into()),
            diagnosis: Some("Piles".into()),
            lab: Some("Blood test".into()),
            pharmacy: Some("levosiz-M".into()),
        }
    }

    #[test]
    fn request_roundtrips_from_json_with_missing_fields() {
        let request: ClaimRequest =
            serde_json::from_str(r#"{"diagnosis": "Piles", "pharmacy": "levosiz-M"}"#).unwrap();
        assert_eq!(request.diagnosis.as_deref(), Some("Piles"));
        assert!(request.complaint.is_none());
        assert!(request.to_fields().is_evaluable());
    }

    #[test]
    fn empty_request_is_rejected() {
        let oracle = ScriptedOracle::always("unused");
        let embedder = HashEmbedder::new(16);
        let index = PolicyIndex::new();
        let pipeline = ClaimPipeline::new(&oracle, &embedder, &index);

        let err = verify_claim(&pipeline, &ClaimRequest::default()).unwrap_err();
        assert!(matches!(err, EvalError::InvalidClaim));
    }

    #[test]
    fn response_breakdown_keys_by_field_name() {
        let oracle = ScriptedOracle::with_replies(&[
            "Field: Pharmacy\nFlagged Item: levosiz-M\nAlternatives:\n- Topical hemorrhoid cream",
        ]);
        let embedder = HashEmbedder::new(16);
        let index = PolicyIndex::new();
        let pipeline = ClaimPipeline::new(&oracle, &embedder, &index);

        let response = verify_claim(&pipeline, &piles_request()).unwrap();
        assert_eq!(response.final_decision, Decision::Allowed);
        assert_eq!(response.approval_probability, 80);
        assert_eq!(response.field_breakdown.len(), 5);

        let pharmacy = &response.field_breakdown["pharmacy"];
        assert_eq!(pharmacy.result, Decision::Allowed);
        assert_eq!(pharmacy.result, pharmacy.decision);
        assert_eq!(pharmacy.probability, 100);
        assert_eq!(response.clinical_flags.len(), 1);
    }

    #[test]
    fn response_serializes_expected_shape() {
        let oracle = ScriptedOracle::always("All fields are clinically coherent. No flags raised.");
        let embedder = HashEmbedder::new(16);
        let index = PolicyIndex::new();
        let pipeline = ClaimPipeline::new(&oracle, &embedder, &index);

        let response = verify_claim(&pipeline, &piles_request()).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["final_decision"], "Allowed");
        assert_eq!(json["approval_probability"], 100);
        assert!(json["field_breakdown"]["diagnosis"]["explanation"].is_string());
        assert!(json["clinical_flags"].as_array().unwrap().is_empty());
    }

    #[test]
    fn field_regeneration_accepts_aliased_field_names() {
        let oracle = ScriptedOracle::always("- Calcitriol\n- Ergocalciferol");
        let embedder = HashEmbedder::new(16);
        let index = PolicyIndex::new();
        let pipeline = ClaimPipeline::new(&oracle, &embedder, &index);

        let request = RegenerateFieldRequest {
            field_name: "prescribed_medication".into(),
            value: "Vitamin D".into(),
            explanation: "Excluded. Routine checkup exclusion.".into(),
            policy_source: None,
            diagnosis: Some("Osteoporosis".into()),
            complaint: None,
            symptoms: None,
        };

        let response = regenerate_field_recommendations(&pipeline, &request).unwrap();
        assert_eq!(response.field_name, "pharmacy");
        assert_eq!(response.recommendations, vec!["Calcitriol", "Ergocalciferol"]);
    }

    #[test]
    fn field_regeneration_rejects_unknown_field() {
        let oracle = ScriptedOracle::always("unused");
        let embedder = HashEmbedder::new(16);
        let index = PolicyIndex::new();
        let pipeline = ClaimPipeline::new(&oracle, &embedder, &index);

        let request = RegenerateFieldRequest {
            field_name: "blood_type".into(),
            value: "x".into(),
            explanation: "y".into(),
            policy_source: None,
            diagnosis: None,
            complaint: None,
            symptoms: None,
        };
        let err = regenerate_field_recommendations(&pipeline, &request).unwrap_err();
        assert!(matches!(err, EvalError::UnknownField(_)));
    }

    #[test]
    fn clinical_regeneration_echoes_identity() {
        let oracle = ScriptedOracle::always("- Sitz baths\n- Fiber supplementation");
        let embedder = HashEmbedder::new(16);
        let index = PolicyIndex::new();
        let pipeline = ClaimPipeline::new(&oracle, &embedder, &index);

        let request = RegenerateClinicalRequest {
            diagnosis: Some("Piles".into()),
            complaint: None,
            symptoms: None,
            lab: None,
            pharmacy: Some("levosiz-M".into()),
            flagged_field: "pharmacy".into(),
            flagged_item: "levosiz-M".into(),
        };

        let response = regenerate_clinical_recommendations(&pipeline, &request);
        assert_eq!(response.flagged_field, "pharmacy");
        assert_eq!(response.flagged_item, "levosiz-M");
        assert_eq!(response.recommendations.len(), 2);
    }
}
