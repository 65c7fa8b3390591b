use chrono::{DateTime, Utc};
use csintel_core::types::Urgency;
use serde::Serialize;

/// Terminal outcome of one classification attempt for an event — once a
/// row exists for an `event_id` the event is never reselected, whichever
/// variant it landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    Success,
    PermanentlyFailed,
}

impl std::fmt::Display for AnnotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotationStatus::Success => write!(f, "success"),
            AnnotationStatus::PermanentlyFailed => write!(f, "permanently_failed"),
        }
    }
}

impl std::str::FromStr for AnnotationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AnnotationStatus::Success),
            "permanently_failed" => Ok(AnnotationStatus::PermanentlyFailed),
            other => Err(format!("unknown annotation status: {other}")),
        }
    }
}

/// One classified (or permanently-failed) event.
#[derive(Debug, Clone, Serialize)]
pub struct LlmAnnotation {
    pub event_id: String,
    pub status: AnnotationStatus,
    pub model: Option<String>,
    pub prompt_version: String,
    pub topic: Option<String>,
    pub urgency: Option<Urgency>,
    pub sentiment: Option<String>,
    pub intent: Option<String>,
    pub summary: Option<String>,
    pub next_action: Option<String>,
    pub escalated: bool,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub latency_ms: u64,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
