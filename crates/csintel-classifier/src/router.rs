use csintel_core::types::Urgency;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::provider::{ClassifyContext, ClassifyResponse, LlmProvider, ProviderError};

const RETRY_BASE_MS: u64 = 500;
/// Bounded attempt count before a classify call is treated as permanently
/// failed for this event.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default length (bytes) past which an event is escalated regardless of
/// the fast model's confidence.
pub const DEFAULT_ESCALATION_TEXT_LEN: usize = 1024;
/// Below this self-reported confidence, escalate (rule (a)).
pub const DEFAULT_ESCALATION_CONFIDENCE: f32 = 0.5;

/// Wraps a fast and an escalation provider and applies three escalation
/// predicates. Escalation is strictly additive: once the
/// escalation model has answered, that answer is final — the router never
/// reverts to the fast model's reading.
pub struct ClassifierRouter {
    fast: Box<dyn LlmProvider>,
    escalation: Box<dyn LlmProvider>,
    fast_model: String,
    escalation_model: String,
    escalation_text_len: usize,
    escalation_confidence: f32,
}

pub struct ClassifyOutcome {
    pub response: ClassifyResponse,
    pub escalated: bool,
}

impl ClassifierRouter {
    pub fn new(
        fast: Box<dyn LlmProvider>,
        escalation: Box<dyn LlmProvider>,
        fast_model: String,
        escalation_model: String,
    ) -> Self {
        Self {
            fast,
            escalation,
            fast_model,
            escalation_model,
            escalation_text_len: DEFAULT_ESCALATION_TEXT_LEN,
            escalation_confidence: DEFAULT_ESCALATION_CONFIDENCE,
        }
    }

    /// `ticket_is_new_and_unannotated` backs escalation predicate (c):
    /// "urgency=critical returned by the fast model and the ticket is
    /// currently new with no prior annotation".
    pub async fn classify(
        &self,
        ctx: &ClassifyContext,
        ticket_is_new_and_unannotated: bool,
    ) -> Result<ClassifyOutcome, ProviderError> {
        let fast_resp = call_with_retry(self.fast.as_ref(), &self.fast_model, ctx).await?;

        let should_escalate = self.needs_escalation(&fast_resp, ctx, ticket_is_new_and_unannotated);
        if !should_escalate {
            return Ok(ClassifyOutcome { response: fast_resp, escalated: false });
        }

        info!(model = %self.escalation_model, "escalating classification");
        let escalated_resp = call_with_retry(self.escalation.as_ref(), &self.escalation_model, ctx).await?;
        Ok(ClassifyOutcome { response: escalated_resp, escalated: true })
    }

    fn needs_escalation(
        &self,
        fast_resp: &ClassifyResponse,
        ctx: &ClassifyContext,
        ticket_is_new_and_unannotated: bool,
    ) -> bool {
        let low_confidence = fast_resp
            .result
            .confidence
            .map(|c| c < self.escalation_confidence)
            .unwrap_or(false);
        let too_long = ctx.text.len() > self.escalation_text_len;
        let critical_on_fresh_ticket = ticket_is_new_and_unannotated
            && fast_resp.result.urgency == Some(Urgency::Critical);

        low_confidence || too_long || critical_on_fresh_ticket
    }
}

/// Retry a single provider call with exponential backoff and jitter.
async fn call_with_retry(
    provider: &dyn LlmProvider,
    model: &str,
    ctx: &ClassifyContext,
) -> Result<ClassifyResponse, ProviderError> {
    let mut delay_ms = RETRY_BASE_MS;
    let mut last_err = None;

    for attempt in 1..=RETRY_MAX_ATTEMPTS {
        match provider.classify(model, ctx).await {
            Ok(resp) => return Ok(resp),
            Err(e) if !e.is_transient() || attempt == RETRY_MAX_ATTEMPTS => {
                return Err(e);
            }
            Err(e) => {
                warn!(provider = provider.name(), attempt, err = %e, "classify call failed, retrying");
                last_err = Some(e);
                sleep(Duration::from_millis(jittered(delay_ms))).await;
                delay_ms *= 2;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("retry loop exhausted".to_string())))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ClassifyResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubProvider {
        confidence: Option<f32>,
        urgency: Option<Urgency>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        async fn classify(&self, model: &str, _ctx: &ClassifyContext) -> Result<ClassifyResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ClassifyResponse {
                result: ClassifyResult {
                    confidence: self.confidence,
                    urgency: self.urgency,
                    ..Default::default()
                },
                model: model.to_string(),
                prompt_tokens: 10,
                completion_tokens: 10,
                latency_ms: 1,
            })
        }
    }

    fn ctx(text: &str) -> ClassifyContext {
        ClassifyContext {
            sender_role: "customer",
            text: text.to_string(),
            recent_ticket_turns: vec![],
            prompt_version: "v1".to_string(),
        }
    }

    #[tokio::test]
    async fn high_confidence_short_text_stays_on_fast_model() {
        let fast = Box::new(StubProvider { confidence: Some(0.9), urgency: Some(Urgency::Low), calls: AtomicU32::new(0) });
        let escalation = Box::new(StubProvider { confidence: Some(0.9), urgency: Some(Urgency::Low), calls: AtomicU32::new(0) });
        let router = ClassifierRouter::new(fast, escalation, "fast".into(), "escalation".into());

        let outcome = router.classify(&ctx("short"), false).await.unwrap();
        assert!(!outcome.escalated);
        assert_eq!(outcome.response.model, "fast");
    }

    #[tokio::test]
    async fn low_confidence_escalates() {
        let fast = Box::new(StubProvider { confidence: Some(0.2), urgency: Some(Urgency::Low), calls: AtomicU32::new(0) });
        let escalation = Box::new(StubProvider { confidence: Some(0.9), urgency: Some(Urgency::Low), calls: AtomicU32::new(0) });
        let router = ClassifierRouter::new(fast, escalation, "fast".into(), "escalation".into());

        let outcome = router.classify(&ctx("short"), false).await.unwrap();
        assert!(outcome.escalated);
        assert_eq!(outcome.response.model, "escalation");
    }

    #[tokio::test]
    async fn critical_on_fresh_ticket_escalates_even_with_high_confidence() {
        let fast = Box::new(StubProvider { confidence: Some(0.95), urgency: Some(Urgency::Critical), calls: AtomicU32::new(0) });
        let escalation = Box::new(StubProvider { confidence: Some(0.95), urgency: Some(Urgency::Critical), calls: AtomicU32::new(0) });
        let router = ClassifierRouter::new(fast, escalation, "fast".into(), "escalation".into());

        let outcome = router.classify(&ctx("short"), true).await.unwrap();
        assert!(outcome.escalated);
    }

    #[tokio::test]
    async fn long_text_escalates() {
        let fast = Box::new(StubProvider { confidence: Some(0.95), urgency: Some(Urgency::Low), calls: AtomicU32::new(0) });
        let escalation = Box::new(StubProvider { confidence: Some(0.95), urgency: Some(Urgency::Low), calls: AtomicU32::new(0) });
        let router = ClassifierRouter::new(fast, escalation, "fast".into(), "escalation".into());

        let long_text = "x".repeat(DEFAULT_ESCALATION_TEXT_LEN + 1);
        let outcome = router.classify(&ctx(&long_text), false).await.unwrap();
        assert!(outcome.escalated);
    }
}
