/// Application-level constants
pub const APP_NAME: &str = "Claimlens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Minimum cosine similarity for a policy clause to count as relevant.
/// Below this the field defaults to Allowed without consulting the oracle.
pub const SIMILARITY_THRESHOLD: f32 = 0.3;

/// Number of candidate clauses pulled from the policy index per field.
pub const RETRIEVAL_TOP_K: usize = 3;

/// Cap on policy-based alternatives shown per excluded field.
pub const MAX_FIELD_RECOMMENDATIONS: usize = 2;

/// Cap on clinical alternatives per consolidated flag.
pub const MAX_CLINICAL_RECOMMENDATIONS: usize = 3;

/// Timeout for a single oracle HTTP call.
pub const ORACLE_TIMEOUT_SECS: u64 = 30;

/// Dimension of the deterministic hash embeddings.
pub const EMBEDDING_DIM: usize = 384;

/// Label attached to results matched against the main policy corpus.
pub const MAIN_POLICY_SOURCE: &str = "FMC Insurance";

/// Label for fields with no usable policy match.
pub const NO_POLICY_SOURCE: &str = "None";
