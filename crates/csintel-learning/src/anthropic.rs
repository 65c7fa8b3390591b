use std::time::Instant;

use async_trait::async_trait;
use csintel_classifier::ProviderError;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{SummaryProvider, SummaryResponse, SummaryResult};

const API_VERSION: &str = "2023-06-01";

/// A summarize-only Anthropic client, the same `messages` shape as
/// `csintel_classifier::anthropic::AnthropicProvider` but asking for a
/// free-text `understanding_text` plus `key_insights` instead of a
/// `ClassifyResult`.
pub struct AnthropicSummaryProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicSummaryProvider {
    pub fn new(client: reqwest::Client, api_key: String, base_url: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }
    }
}

#[async_trait]
impl SummaryProvider for AnthropicSummaryProvider {
    async fn summarize(&self, model: &str, prompt: &str) -> Result<SummaryResponse, ProviderError> {
        let system = "You study customer-service chat logs for a clinic network. Produce a \
             single JSON object with fields: understanding_text (a free-form prose summary of \
             response patterns, recurring issues, and staff behavior) and key_insights (a short \
             array of structured one-line observations).";

        let body = serde_json::json!({
            "model": model,
            "max_tokens": 4096,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
        });

        debug!(model, "sending self-learning summarize request to Anthropic");
        let started = Instant::now();

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic summarize call failed");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let _latency_ms = started.elapsed().as_millis() as u64;

        let text = api_resp
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Unknown => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let raw = extract_json(&text).ok_or_else(|| ProviderError::Parse("no JSON object in model response".to_string()))?;
        let result: SummaryResult =
            serde_json::from_value(raw).map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(SummaryResponse {
            understanding_text: result.understanding_text,
            key_insights: result.key_insights,
            model: api_resp.model,
            prompt_tokens: api_resp.usage.input_tokens,
            completion_tokens: api_resp.usage.output_tokens,
        })
    }
}

fn extract_json(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let text = "Here:\n{\"understanding_text\":\"ok\",\"key_insights\":[\"a\"]}\nDone.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["understanding_text"], "ok");
    }
}
