//! Deterministic parsing of free-text oracle replies.
//!
//! The oracle's contract is loose by nature; everything here recovers a
//! usable structure from its replies without ever failing the claim.

use crate::models::{ClinicalFlag, Decision};

/// Reply phrasings that mean the clause denies coverage. Checked before the
/// inclusion phrases: exclusion wins when a reply carries both.
pub const EXCLUSION_PHRASES: &[&str] = &[
    "not covered",
    "denied",
    "non-formulary",
    "not approved",
    "not payable",
];

/// Reply phrasings that mean the clause grants coverage.
pub const INCLUSION_PHRASES: &[&str] = &["covered", "approved", "allowed", "payable"];

/// A decision recovered from an oracle reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDecision {
    pub decision: Decision,
    /// False when neither phrase class matched and the literal "excluded"
    /// fallback decided; a data-quality signal worth logging.
    pub matched_phrase: bool,
}

/// Scan a reply for coverage phrasing.
///
/// Exclusion phrases take precedence over inclusion phrases; with neither
/// present the lowercased reply is checked for the literal token "excluded",
/// and otherwise the decision defaults to Allowed.
pub fn parse_decision(reply: &str) -> ParsedDecision {
    let lower = reply.to_lowercase();

    if EXCLUSION_PHRASES.iter().any(|p| lower.contains(p)) {
        return ParsedDecision {
            decision: Decision::Excluded,
            matched_phrase: true,
        };
    }

    if INCLUSION_PHRASES.iter().any(|p| lower.contains(p)) {
        return ParsedDecision {
            decision: Decision::Allowed,
            matched_phrase: true,
        };
    }

    let decision = if lower.contains("excluded") {
        Decision::Excluded
    } else {
        Decision::Allowed
    };
    ParsedDecision {
        decision,
        matched_phrase: false,
    }
}

/// Parse a reply into a capped list of alternatives.
///
/// Accepts dashed, bulleted, numbered, or bare lines; drops headers, bare
/// numbers, and fragments too short to be actionable.
pub fn parse_suggestions(reply: &str, cap: usize) -> Vec<String> {
    let mut suggestions = Vec::new();

    for raw_line in reply.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.chars().all(|c| c.is_ascii_digit()) || line.ends_with(':') {
            continue;
        }

        let stripped = strip_list_marker(line);
        if stripped.len() > 3 && !suggestions.iter().any(|s: &String| s == stripped) {
            suggestions.push(stripped.to_string());
        }

        if suggestions.len() == cap {
            break;
        }
    }

    suggestions
}

fn strip_list_marker(line: &str) -> &str {
    let line = line
        .trim_start_matches("- ")
        .trim_start_matches("• ")
        .trim_start_matches("* ");

    // Numbered markers: "1. " / "2) "
    let mut chars = line.char_indices().peekable();
    let mut digits_end = 0;
    while let Some((i, c)) = chars.peek().copied() {
        if c.is_ascii_digit() {
            digits_end = i + c.len_utf8();
            chars.next();
        } else {
            break;
        }
    }
    if digits_end > 0 {
        let rest = &line[digits_end..];
        if let Some(stripped) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return stripped.trim();
        }
    }

    line.trim()
}

/// True when the coherence reply is the all-clear sentinel.
pub fn is_coherent_reply(reply: &str) -> bool {
    reply.contains("No flags raised") || reply.contains("clinically coherent")
}

/// Parse `Field:` / `Flagged Item:` / `Alternatives:` blocks from a
/// coherence reply into raw, unconsolidated flags.
pub fn parse_clinical_blocks(reply: &str) -> Vec<ClinicalFlag> {
    let mut flags = Vec::new();
    let mut current: Option<ClinicalFlag> = None;
    let mut in_alternatives = false;

    for raw_line in reply.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(field) = line.strip_prefix("Field:") {
            if let Some(flag) = current.take() {
                if !flag.flagged_field.is_empty() {
                    flags.push(flag);
                }
            }
            current = Some(ClinicalFlag {
                flagged_field: field.trim().to_lowercase(),
                flagged_item: String::new(),
                recommendations: Vec::new(),
                reasoning: String::new(),
            });
            in_alternatives = false;
        } else if let Some(item) = line.strip_prefix("Flagged Item:") {
            if let Some(flag) = current.as_mut() {
                flag.flagged_item = item.trim().to_string();
            }
        } else if let Some(reason) = line.strip_prefix("Reason:") {
            if let Some(flag) = current.as_mut() {
                flag.reasoning = reason.trim().to_string();
            }
        } else if line.to_lowercase().starts_with("alternatives:") {
            in_alternatives = current.is_some();
        } else if in_alternatives {
            if let Some(flag) = current.as_mut() {
                let rec = strip_list_marker(line);
                if !rec.is_empty() {
                    flag.recommendations.push(rec.to_string());
                }
            }
        }
    }

    if let Some(flag) = current {
        if !flag.flagged_field.is_empty() {
            flags.push(flag);
        }
    }

    flags
}
