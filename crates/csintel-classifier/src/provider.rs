use std::str::FromStr;

use async_trait::async_trait;
use csintel_core::types::Urgency;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything the classifier needs to build one LLM call: the event text,
/// the preceding turns of the same ticket, and the sender's role.
#[derive(Debug, Clone)]
pub struct ClassifyContext {
    pub sender_role: &'static str,
    pub text: String,
    pub recent_ticket_turns: Vec<String>,
    pub prompt_version: String,
}

/// The structured object an LLM call is expected to return.
/// Every field but `urgency` defaults to `None` on a lenient parse; a
/// non-enum `urgency` value is a hard parse failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClassifyResult {
    pub topic: Option<String>,
    pub urgency: Option<Urgency>,
    pub sentiment: Option<String>,
    pub intent: Option<String>,
    pub summary: Option<String>,
    pub next_action: Option<String>,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ClassifyResponse {
    pub result: ClassifyResult,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub latency_ms: u64,
}

/// Common interface for the fast and escalation models. A single trait
/// covers both tiers — only the `model` string passed to `classify` differs.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn classify(
        &self,
        model: &str,
        ctx: &ClassifyContext,
    ) -> Result<ClassifyResponse, ProviderError>;
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Transient errors are retried with backoff;
    /// everything else is a permanent failure for this attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(_) => true,
            ProviderError::RateLimited { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Parse(_) | ProviderError::Unavailable(_) => false,
        }
    }
}

/// Parse a raw JSON response body into a `ClassifyResult`, lenient on
/// missing optional fields, strict on an unparseable `urgency`.
pub fn parse_classify_result(raw: &serde_json::Value) -> Result<ClassifyResult, ProviderError> {
    let urgency = match raw.get("urgency").and_then(|v| v.as_str()) {
        Some(s) => Some(
            Urgency::from_str(s)
                .map_err(|_| ProviderError::Parse(format!("unrecognized urgency: {s}")))?,
        ),
        None => None,
    };

    Ok(ClassifyResult {
        topic: raw.get("topic").and_then(|v| v.as_str()).map(str::to_string),
        urgency,
        sentiment: raw.get("sentiment").and_then(|v| v.as_str()).map(str::to_string),
        intent: raw.get("intent").and_then(|v| v.as_str()).map(str::to_string),
        summary: raw.get("summary").and_then(|v| v.as_str()).map(str::to_string),
        next_action: raw.get("next_action").and_then(|v| v.as_str()).map(str::to_string),
        confidence: raw.get("confidence").and_then(|v| v.as_f64()).map(|f| f as f32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_optional_fields_default_to_none() {
        let raw = json!({ "urgency": "low" });
        let result = parse_classify_result(&raw).unwrap();
        assert_eq!(result.urgency, Some(Urgency::Low));
        assert!(result.topic.is_none());
        assert!(result.confidence.is_none());
    }

    #[test]
    fn unrecognized_urgency_is_a_parse_failure() {
        let raw = json!({ "urgency": "catastrophic" });
        assert!(parse_classify_result(&raw).is_err());
    }

    #[test]
    fn server_error_status_is_transient() {
        let err = ProviderError::Api { status: 503, message: "busy".into() };
        assert!(err.is_transient());
        let err = ProviderError::Api { status: 400, message: "bad request".into() };
        assert!(!err.is_transient());
    }
}
