pub mod coherence;
pub mod consolidate;
pub mod corpus;
pub mod embedding;
pub mod evaluator;
pub mod index;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod reply;
pub mod rules;
pub mod score;

use thiserror::Error;

use oracle::OracleError;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("No claim fields populated")]
    InvalidClaim,

    #[error("Unknown field name: {0}")]
    UnknownField(String),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Policy index error: {0}")]
    Index(String),
}
