use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::warn;

const RETRY_BASE_MS: u64 = 500;
const RETRY_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Slack returned {status}: {body}")]
    Api { status: u16, body: String },
}

impl SlackError {
    fn is_transient(&self) -> bool {
        match self {
            SlackError::Http(_) => true,
            SlackError::Api { status, .. } => *status >= 500,
        }
    }
}

/// One outgoing webhook POST with exponential backoff. Constructed only when
/// `config.slack_webhook_url` is set — SLA breach alerting is otherwise a
/// no-op.
pub struct SlackClient {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackClient {
    pub fn new(client: reqwest::Client, webhook_url: String) -> Self {
        Self { client, webhook_url }
    }

    pub async fn post_text(&self, text: &str) -> Result<(), SlackError> {
        let mut delay_ms = RETRY_BASE_MS;
        let mut last_err = None;

        for attempt in 1..=RETRY_MAX_ATTEMPTS {
            match self.send_once(text).await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_transient() || attempt == RETRY_MAX_ATTEMPTS => return Err(e),
                Err(e) => {
                    warn!(attempt, err = %e, "Slack POST failed, retrying");
                    last_err = Some(e);
                    sleep(Duration::from_millis(jittered(delay_ms))).await;
                    delay_ms *= 2;
                }
            }
        }

        Err(last_err.unwrap_or(SlackError::Api { status: 0, body: "retry loop exhausted".into() }))
    }

    async fn send_once(&self, text: &str) -> Result<(), SlackError> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SlackError::Api { status, body });
        }
        Ok(())
    }
}

fn jittered(base_ms: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let max_jitter = base_ms / 10;
    if max_jitter == 0 {
        return base_ms;
    }
    base_ms + (nanos as u64 % max_jitter)
}
