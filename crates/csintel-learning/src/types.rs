use chrono::{DateTime, Utc};
use csintel_core::types::{LearningStatus, TriggerType};
use serde::Serialize;

/// A versioned, append-only corpus summary. There
/// is no UPDATE path — a new version is a new row.
#[derive(Debug, Clone, Serialize)]
pub struct Understanding {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub logs_analyzed_count: u32,
    pub logs_date_from: Option<DateTime<Utc>>,
    pub logs_date_to: DateTime<Utc>,
    pub understanding_text: String,
    pub key_insights: Vec<String>,
    pub model_used: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One row per run of the self-learning job.
#[derive(Debug, Clone, Serialize)]
pub struct LearningExecution {
    pub id: String,
    pub executed_at: DateTime<Utc>,
    pub trigger_type: TriggerType,
    pub status: LearningStatus,
    pub duration_seconds: Option<f64>,
    pub understanding_version: Option<u32>,
    pub error_message: Option<String>,
}
