//! LLM oracle capability interface and its local Ollama implementation.
//!
//! The engine treats the LLM as a black-box text-completion oracle:
//! `classify` returns a free-text verdict, `suggest` a short list of
//! alternatives. Any backend satisfying the trait is substitutable, which is
//! also what makes the evaluators unit-testable with a scripted fake.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::reply::parse_suggestions;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle connection failed: {0}")]
    Connection(String),

    #[error("Oracle request timed out after {0}s")]
    Timeout(u64),

    #[error("Oracle returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("No model available")]
    NoModel,
}

/// Text-completion capability used by both evaluators.
pub trait Oracle {
    /// One free-text reply to a system + user prompt pair.
    fn classify(&self, system: &str, prompt: &str) -> Result<String, OracleError>;

    /// Up to `cap` list-formatted alternatives parsed from a reply.
    fn suggest(&self, system: &str, prompt: &str, cap: usize) -> Result<Vec<String>, OracleError> {
        let reply = self.classify(system, prompt)?;
        Ok(parse_suggestions(&reply, cap))
    }
}

/// Ollama HTTP client for local LLM inference.
pub struct OllamaOracle {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaOracle {
    /// Create a new oracle pointing at an Ollama instance.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    /// Default Ollama instance at localhost:11434 with the configured
    /// oracle timeout.
    pub fn default_local(model: &str) -> Self {
        Self::new(
            "http://localhost:11434",
            model,
            crate::config::ORACLE_TIMEOUT_SECS,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_model_available(&self) -> Result<bool, OracleError> {
        let model = self.model.clone();
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(&model)))
    }

    pub fn list_models(&self) -> Result<Vec<String>, OracleError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() {
                OracleError::Connection(self.base_url.clone())
            } else {
                OracleError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| OracleError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl Oracle for OllamaOracle {
    fn classify(&self, system: &str, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                OracleError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                OracleError::Timeout(self.timeout_secs)
            } else {
                OracleError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| OracleError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Scripted oracle for testing. Replays queued replies and records the
/// prompts it was asked, so tests can assert on prompt content.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    default_reply: Option<String>,
    unreachable: bool,
    seen_prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    /// Oracle that always answers with `reply`.
    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: Some(reply.to_string()),
            unreachable: false,
            seen_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Oracle that answers queued replies in order, then errors.
    pub fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            default_reply: None,
            unreachable: false,
            seen_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Oracle that fails every call, simulating a dead endpoint.
    pub fn unreachable() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: None,
            unreachable: true,
            seen_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt this oracle has been asked, in call order.
    pub fn seen_prompts(&self) -> Vec<String> {
        self.seen_prompts.lock().unwrap().clone()
    }
}

impl Oracle for ScriptedOracle {
    fn classify(&self, system: &str, prompt: &str) -> Result<String, OracleError> {
        if self.unreachable {
            return Err(OracleError::Connection("scripted: unreachable".into()));
        }

        self.seen_prompts
            .lock()
            .unwrap()
            .push(format!("{system}\n{prompt}"));

        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return Ok(reply);
        }
        self.default_reply
            .clone()
            .ok_or_else(|| OracleError::ResponseParsing("scripted: reply queue empty".into()))
    }
}
