use async_trait::async_trait;
use csintel_classifier::ProviderError;
use serde::Deserialize;

/// The self-learning job's single LLM call per run. A separate trait from
/// `csintel_classifier::LlmProvider` because the shape of the response is a
/// free-text summary plus a short insight list, not a `ClassifyResult`.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, model: &str, prompt: &str) -> Result<SummaryResponse, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct SummaryResponse {
    pub understanding_text: String,
    pub key_insights: Vec<String>,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Raw JSON shape requested of the model.
#[derive(Debug, Deserialize)]
pub struct SummaryResult {
    pub understanding_text: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
}
