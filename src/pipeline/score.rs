//! Approval scoring.
//!
//! Flat deduction model, not a weighted average: one excluded field costs
//! the same 20 points as five, and unresolved clinical flags cost a further
//! flat 20. Surprising but deliberate; the steps are product constants and
//! changing them would silently alter observable behavior.

use crate::models::{ClaimResult, Decision};

const EXCLUSION_DEDUCTION: u8 = 20;
const CLINICAL_FLAG_DEDUCTION: u8 = 20;

/// Score a claim from its overall decision and unresolved-flag state.
pub fn approval_score(overall_decision: Decision, has_unresolved_flags: bool) -> u8 {
    let mut score: u8 = 100;
    if overall_decision == Decision::Excluded {
        score = score.saturating_sub(EXCLUSION_DEDUCTION);
    }
    if has_unresolved_flags {
        score = score.saturating_sub(CLINICAL_FLAG_DEDUCTION);
    }
    score
}

/// Recompute a claim's overall decision and score in place.
///
/// The overall decision is Allowed iff no field remains Excluded. Called
/// explicitly by the Presenter after every apply action; rescoring is not
/// automatic.
pub fn rescore(result: &mut ClaimResult) {
    result.final_decision = if result.has_excluded_field() {
        Decision::Excluded
    } else {
        Decision::Allowed
    };
    result.approval_probability =
        approval_score(result.final_decision, !result.clinical_flags.is_empty());
}
