use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{parse_classify_result, ClassifyContext, ClassifyResponse, LlmProvider, ProviderError};

const API_VERSION: &str = "2023-06-01";

/// A classify-only Anthropic client: one `messages` call per event, asking
/// for a JSON object matching `ClassifyResult`. Non-streaming, tool-free —
/// this worker never needs either.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(client: reqwest::Client, api_key: String, base_url: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn classify(
        &self,
        model: &str,
        ctx: &ClassifyContext,
    ) -> Result<ClassifyResponse, ProviderError> {
        let system = format!(
            "You are a CS intelligence classifier. Read one chat message and its recent \
             ticket context, then respond with a single JSON object with fields: topic, \
             urgency (one of low/medium/high/critical), sentiment, intent, summary, \
             next_action, confidence (0.0-1.0). Sender role: {}. Prompt version: {}.",
            ctx.sender_role, ctx.prompt_version
        );
        let mut user_content = String::new();
        for turn in &ctx.recent_ticket_turns {
            user_content.push_str(turn);
            user_content.push('\n');
        }
        user_content.push_str("---\n");
        user_content.push_str(&ctx.text);

        let body = serde_json::json!({
            "model": model,
            "max_tokens": 512,
            "system": system,
            "messages": [{ "role": "user", "content": user_content }],
        });

        debug!(model, "sending classify request to Anthropic");
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
            warn!(status, body = %text, "Anthropic classify call failed");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text = api_resp
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Unknown => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let raw: serde_json::Value = extract_json(&text)
            .ok_or_else(|| ProviderError::Parse("no JSON object in model response".to_string()))?;
        let result = parse_classify_result(&raw)?;

        Ok(ClassifyResponse {
            result,
            model: api_resp.model,
            prompt_tokens: api_resp.usage.input_tokens,
            completion_tokens: api_resp.usage.output_tokens,
            latency_ms,
        })
    }
}

/// Models occasionally wrap JSON in prose or a code fence; take the first
/// `{...}` span rather than requiring the whole response to be pure JSON.
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
        let text = "Sure, here you go:\n{\"urgency\":\"low\"}\nHope that helps.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["urgency"], "low");
    }

    #[test]
    fn returns_none_without_braces() {
        assert!(extract_json("no json here").is_none());
    }
}
