//! The built-in policy corpus and its chunking into indexable clauses.

use super::embedding::EmbeddingModel;
use super::index::PolicyIndex;
use super::EvalError;
use crate::config::MAIN_POLICY_SOURCE;

/// Drug formulary & prescription regulations used as the main exclusion
/// corpus.
pub const MAIN_POLICY_TEXT: &str = r#"
FMC Insurance – Drug Formulary & Prescription Regulations (Draft)

General Principles
- The formulary defines all medications approved for coverage under FMC Health Insurance.
- Medications outside the formulary, or not compliant with the rules below, are not covered (denied).
- Prescriptions must be issued by a licensed physician and linked to a valid diagnosis.
- All prescriptions must clearly include dosage, strength, frequency, and duration.

Coverage Rules
- Generic Preference:
  - Covered: Generic equivalents where available.
  - Branded: Covered only if no equivalent generic exists or if explicitly justified by the physician.

- Dosage & Strength:
  - Only approved strengths are covered.
  - Example (Procid): Covered → Procid 20 mg; Not covered → Procid 40 mg.

- Brand Substitution:
  - Non-formulary brands are not covered when a formulary brand exists.
  - Example: Panadol → Not covered; Adol → Covered.

Duration Limits
- Acute conditions (e.g., fever, cough, gastritis, sinusitis):
  - Maximum covered duration: 10 days.
  - Prescriptions exceeding 10 days are not covered unless medically justified and pre-authorized.

- Chronic conditions (e.g., diabetes, hypertension, asthma):
  - Maintenance medicines: Covered up to 30 days per refill.
  - Durations beyond 30 days require prior approval.

Exclusions (Not Covered)
- Non-medically necessary items (vitamins, supplements, tonics, herbal remedies, cosmetic products, weight-loss medications).
- Experimental / non-standard therapies (e.g., stem cell therapy, unregistered biologics).
- Over-the-counter (OTC) medications unless prescribed and included in the formulary.

Prescription Compliance
- The prescription must match the clinical diagnosis and chief complaints.
  - Example: Gastritis diagnosis should align with complaints like abdominal pain, bloating, reflux.
  - Mismatch (e.g., headache complaint with sinusitis diagnosis) → Not covered.
- All five clinical fields are mandatory for evaluation:
  - Chief Complaints, Symptoms, Diagnosis, Lab/Investigations, Pharmacy.
- Missing or incomplete documentation may lead to rejection.

Pharmacy Dispensing Rules
- Medicines must be dispensed strictly as per the physician prescription and formulary guidelines.
- Substitution to covered alternatives (e.g., Adol instead of Panadol) must be documented in the claim submission.
- Any deviation requires prior approval from the FMC insurance medical review team.

Examples (Applied Rules)
- Procid 20 mg → Covered (e.g., for gastritis/GERD/PUD).
- Procid 40 mg → Not covered.
- Panadol → Not covered.
- Adol → Covered.
- Antibiotics for acute sinusitis → Covered up to 10 days.
- Cough syrups (acute) → Covered, maximum 10 days.
- Multivitamins → Not covered unless deficiency is proven by lab.
"#;

/// Phrases that mark a prose line as a rule worth indexing even when it is
/// not a dash bullet.
const RULE_PHRASES: &[&str] = &[
    "not covered",
    "excluded",
    "will be denied",
    "denied unless",
    "maximum prescription coverage",
    "max 10 days",
    "require prior approval",
    "requires prior approval",
    "only approved strengths",
    "non-formulary",
    "generic equivalents",
    "brand substitution",
    "must be",
    "mandatory for evaluation",
];

/// Extract meaningful policy rules/exclusions from a policy document.
///
/// Keeps dash bullets, lines carrying known rule phrasing, and explicit
/// arrow-rule examples; drops headings and separators.
pub fn extract_exclusion_lines(policy_text: &str) -> Vec<String> {
    let mut extracted = Vec::new();

    for raw_line in policy_text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || matches!(line, "---" | "—" | "–––") {
            continue;
        }

        if line.starts_with('-') {
            extracted.push(line.trim_start_matches(['-', ' ']).to_string());
            continue;
        }

        let lower = line.to_lowercase();
        if RULE_PHRASES.iter().any(|kw| lower.contains(kw)) {
            extracted.push(line.to_string());
            continue;
        }

        if line.contains('→') {
            extracted.push(line.to_string());
        }
    }

    extracted
}

/// Index the built-in corpus. Safe to call repeatedly: clause ids are
/// stable, so a second pass skips everything.
pub fn load_default_corpus(
    index: &mut PolicyIndex,
    embedder: &dyn EmbeddingModel,
) -> Result<usize, EvalError> {
    let clauses = extract_exclusion_lines(MAIN_POLICY_TEXT);
    let mut loaded = 0;

    for (i, clause) in clauses.iter().enumerate() {
        let id = format!("policy_{i}");
        if index.load(&id, clause, MAIN_POLICY_SOURCE, embedder)? {
            loaded += 1;
        }
    }

    tracing::info!(
        total = clauses.len(),
        loaded,
        "Policy corpus load completed"
    );
    Ok(loaded)
}
