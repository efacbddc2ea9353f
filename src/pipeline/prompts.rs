//! Prompt construction for the two oracle-backed evaluators.

use crate::models::{ClaimFields, FieldName};

pub const VERIFIER_SYSTEM_PROMPT: &str = "You are an expert insurance claim verification assistant. Decide strictly from the policy clause text you are given. Never infer exclusions from medical reasoning, associations, or assumed causes.";

pub const ADVISOR_SYSTEM_PROMPT: &str = "You are a medical insurance policy expert with comprehensive knowledge of covered treatments, medications, and procedures. Provide concise, specific, policy-compliant alternatives.";

pub const CLINICAL_ADVISOR_SYSTEM_PROMPT: &str = "You are a senior clinical pharmacist providing alternative recommendations for a medical logic inconsistency. Recommendations must be practical, actionable, and appropriate for the stated diagnosis.";

pub const CLINICAL_SYSTEM_PROMPT: &str = r#"You are a clinical verification assistant for an insurance claim checker.
You receive a case with five clinical fields and, when available, a policy excerpt retrieved for context.
Your job is to check clinical coherence across fields and output at most ONE flag based on priority, or no flags if coherent.

PRIORITY (choose the first true mismatch):
1) Chief Complaints vs Diagnosis
2) Symptoms vs Diagnosis
3) Lab/Investigations vs Diagnosis
4) Pharmacy vs Diagnosis (clinical appropriateness)

ITEM RULE (load-bearing):
- When a field lists multiple comma-separated items, evaluate EACH item independently against the diagnosis.
- Flag ONLY the genuinely inappropriate items. An appropriate item listed alongside an inappropriate one must NOT be flagged.

COMPLAINT RULE:
- Flag the chief complaint ONLY if it is clearly unrelated to the diagnosis domain.
- If a concrete lab mismatch exists and the complaint is generic (e.g., "pain", "fever"), prefer the lab flag.

LAB RULE:
- Normalize obvious variants ("xray", "x-ray", "x ray").
- Flag tests whose target system differs from the diagnosis, or that do not confirm, characterize, or monitor it.
- Prefer minimally invasive, first-line alternatives targeted at the diagnosis.

PHARMACY RULE:
- Do NOT flag guideline-concordant medications. Flag only items clinically inappropriate for the diagnosis.
- For duration problems, suggest the SAME medication with a compliant duration, not a different drug.

OUTPUT FORMAT (MUST MATCH EXACTLY)
For each issue:
Field: <field_name>
Flagged Item: <only_the_problematic_item>
Alternatives:
<alt1>
<alt2>
<alt3>

Field must be one of: Chief Complaints, Symptoms, Lab/Investigations, Pharmacy.
If no mismatches are found, respond exactly: All fields are clinically coherent. No flags raised."#;

/// Field-specific decision rules appended to the exclusion-check prompt.
fn field_rules(field: FieldName) -> &'static str {
    match field {
        FieldName::Diagnosis => {
            "- Only answer \"Excluded\" if the diagnosis is explicitly mentioned or very clearly described in the clause.\n- If the diagnosis term is not present in the clause, it is covered by default."
        }
        FieldName::Complaint => {
            "- Only respond \"Excluded\" if the clause explicitly uses non-coverage phrasing (\"not covered\", \"denied\", \"not approved\", \"non-formulary\", \"not payable\") for the complaint.\n- Mere mention of complaints without non-coverage phrasing means \"Allowed\"."
        }
        FieldName::Symptoms => {
            "- Only respond \"Excluded\" if the clause explicitly uses non-coverage phrasing for the symptom(s).\n- If the symptoms are not present in the clause, respond \"Allowed\"."
        }
        FieldName::Lab => {
            "- Respond \"Excluded\" ONLY if the clause uses explicit non-coverage phrasing for the lab test.\n- If the test name or abbreviation is not present in the clause, respond \"Allowed\"."
        }
        FieldName::Pharmacy => {
            "- Treat as NOT COVERED: \"not covered\", \"not approved\", \"denied\", \"non-formulary\", \"not payable\", explicit strength restrictions, and duration violations stated in the clause.\n- Treat as COVERED: \"covered\", \"approved\", \"allowed\", \"payable\".\n- If the medicine is not mentioned in the clause at all, respond \"Allowed\"."
        }
    }
}

/// Build the exclusion-check prompt for one field against one clause.
pub fn exclusion_check_prompt(field: FieldName, clause: &str, value: &str) -> String {
    format!(
        "IMPORTANT RULES:\n- The following policy clause is from an exclusion list.\n{rules}\n\nPolicy clause:\n\"{clause}\"\n\n{label}:\n\"{value}\"\n\nRespond with exactly one of: Allowed or Excluded. Then add one short justification based strictly on the clause.",
        rules = field_rules(field),
        label = field.label(),
    )
}

/// Build the clinical coherence prompt over the full case.
pub fn clinical_case_prompt(fields: &ClaimFields, policy_excerpt: Option<&str>) -> String {
    let mut prompt = format!(
        "Use the following case to perform the clinical coherence check as instructed.\n\nCase\nChief Complaints: {complaint}\nSymptoms: {symptoms}\nDiagnosis: {diagnosis}\nLab/Investigations: {lab}\nPharmacy: {pharmacy}\n",
        complaint = fields.get(FieldName::Complaint).unwrap_or(""),
        symptoms = fields.get(FieldName::Symptoms).unwrap_or(""),
        diagnosis = fields.get(FieldName::Diagnosis).unwrap_or(""),
        lab = fields.get(FieldName::Lab).unwrap_or(""),
        pharmacy = fields.get(FieldName::Pharmacy).unwrap_or(""),
    );

    if let Some(excerpt) = policy_excerpt {
        prompt.push_str("\nPolicy excerpt\n");
        prompt.push_str(excerpt);
        prompt.push('\n');
    }

    prompt
}

/// Clinical context lines shared by the alternatives prompts. Diagnosis
/// awareness is mandatory: a generic interchangeable substitute is a defect.
fn clinical_context(fields: &ClaimFields) -> String {
    format!(
        "PATIENT CLINICAL CONTEXT:\n- Diagnosis: {diagnosis}\n- Chief Complaint: {complaint}\n- Symptoms: {symptoms}\n",
        diagnosis = fields.get(FieldName::Diagnosis).unwrap_or(""),
        complaint = fields.get(FieldName::Complaint).unwrap_or(""),
        symptoms = fields.get(FieldName::Symptoms).unwrap_or(""),
    )
}

/// Ask for allowed alternatives to an excluded field value.
pub fn policy_alternatives_prompt(
    field: FieldName,
    value: &str,
    explanation: &str,
    fields: &ClaimFields,
) -> String {
    let diagnosis = fields.get(FieldName::Diagnosis).unwrap_or("the stated condition");
    format!(
        "TASK: Generate DIAGNOSIS-AWARE ALLOWED ALTERNATIVES for an excluded {field} item.\n\nEXCLUDED ITEM: {value}\nEXCLUSION REASON: {explanation}\n\n{context}\nREQUIREMENTS:\n1. Provide 2 SPECIFIC, REAL alternatives that would be allowed by the policy.\n2. Alternatives MUST be contextually appropriate for treating or managing \"{diagnosis}\", not generic substitutes.\n3. NO generic advice like \"submit documentation\" or \"get prior auth\".\n\nOUTPUT FORMAT (STRICT):\n- [Diagnosis-appropriate alternative 1]\n- [Diagnosis-appropriate alternative 2]",
        field = field.as_str(),
        context = clinical_context(fields),
    )
}

/// Ask for fresh alternatives for a single clinically-flagged item.
pub fn clinical_alternatives_prompt(
    flagged_field: &str,
    flagged_item: &str,
    fields: &ClaimFields,
) -> String {
    format!(
        "A clinical inconsistency was identified in an insurance claim.\n\n{context}- Lab Tests: {lab}\n- Prescribed Medication: {pharmacy}\n\nIDENTIFIED ISSUE:\n- Flagged Field: {flagged_field}\n- Problematic Item: {flagged_item}\n\nTASK: Generate 2 NEW alternative recommendations to resolve this clinical inconsistency for this item only. Focus on practical, diagnosis-appropriate steps.\n\nProvide ONLY the recommendations, one per line, starting with \"- \".",
        context = clinical_context(fields),
        lab = fields.get(FieldName::Lab).unwrap_or(""),
        pharmacy = fields.get(FieldName::Pharmacy).unwrap_or(""),
    )
}
