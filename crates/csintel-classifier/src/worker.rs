use std::sync::Arc;

use csintel_events::EventStore;
use csintel_tickets::TicketStore;
use tracing::{instrument, warn};

use crate::error::Result;
use crate::provider::ClassifyContext;
use crate::router::{ClassifierRouter, RETRY_MAX_ATTEMPTS};
use crate::store::AnnotationStore;

const PROMPT_VERSION: &str = "cs-classifier-v1";
/// Messages of the same ticket carried as context.
const DEFAULT_CONTEXT_TURNS: usize = 10;

/// The classifier worker: pulls unclassified events in small batches, calls
/// the LLM via `ClassifierRouter`, and writes back both the `LlmAnnotation`
/// and the bound ticket's enrichment fields.
pub struct ClassifierWorker {
    annotations: AnnotationStore,
    events: Arc<EventStore>,
    tickets: Arc<TicketStore>,
    router: ClassifierRouter,
    batch_size: usize,
    max_tokens_per_run: u64,
}

impl ClassifierWorker {
    pub fn new(
        annotations: AnnotationStore,
        events: Arc<EventStore>,
        tickets: Arc<TicketStore>,
        router: ClassifierRouter,
        batch_size: usize,
        max_tokens_per_run: u64,
    ) -> Self {
        Self {
            annotations,
            events,
            tickets,
            router,
            batch_size,
            max_tokens_per_run,
        }
    }

    /// Process one tick's worth of work: a single batch, stopping early if
    /// the token budget for this run is exhausted. Returns the number of events that reached a terminal
    /// annotation state (success or permanently failed).
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize> {
        let candidate_ids = self.annotations.list_unclassified_event_ids(self.batch_size)?;
        let mut processed = 0usize;
        let mut tokens_used: u64 = 0;

        for event_id in candidate_ids {
            if tokens_used >= self.max_tokens_per_run {
                warn!(tokens_used, max = self.max_tokens_per_run, "token budget exhausted, yielding for this tick");
                break;
            }

            let Some(event) = self.events.get(&event_id)? else {
                continue;
            };
            let Some(ticket_id) = &event.ticket_id else {
                warn!(event_id, "event has no bound ticket yet, skipping this tick");
                continue;
            };
            let Some(ticket) = self.tickets.get(ticket_id)? else {
                warn!(event_id, ticket_id, "bound ticket not found, skipping");
                continue;
            };

            let recent = self.events.list_for_ticket(ticket_id, DEFAULT_CONTEXT_TURNS)?;
            let recent_turns: Vec<String> = recent
                .iter()
                .filter(|e| e.id != event_id)
                .map(|e| format!("{}: {}", if e.is_staff() { "staff" } else { "customer" }, e.text_raw))
                .collect();

            let ctx = ClassifyContext {
                sender_role: if event.is_staff() { "staff" } else { "customer" },
                text: event.text_raw.clone(),
                recent_ticket_turns: recent_turns,
                prompt_version: PROMPT_VERSION.to_string(),
            };
            let ticket_is_new_and_unannotated =
                ticket.status == csintel_core::types::TicketStatus::New && ticket.topic_primary.is_none();

            match self.router.classify(&ctx, ticket_is_new_and_unannotated).await {
                Ok(outcome) => {
                    tokens_used += u64::from(outcome.response.prompt_tokens + outcome.response.completion_tokens);
                    self.annotations.insert_success(&event_id, PROMPT_VERSION, &outcome.response, outcome.escalated, 1)?;
                    self.tickets.apply_annotation(
                        ticket_id,
                        outcome.response.result.topic.as_deref(),
                        outcome.response.result.summary.as_deref(),
                        outcome.response.result.next_action.as_deref(),
                        outcome.response.result.urgency,
                    )?;
                }
                Err(e) => {
                    warn!(event_id, err = %e, "classification permanently failed for this event");
                    self.annotations.insert_permanently_failed(
                        &event_id,
                        PROMPT_VERSION,
                        RETRY_MAX_ATTEMPTS,
                        &e.to_string(),
                    )?;
                }
            }
            processed += 1;
        }

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ClassifyResponse, ClassifyResult, LlmProvider, ProviderError};
    use async_trait::async_trait;
    use csintel_events::NewMessageEvent;
    use csintel_tickets::EventKind;

    struct StubFast;
    #[async_trait]
    impl LlmProvider for StubFast {
        fn name(&self) -> &str {
            "stub-fast"
        }
        async fn classify(&self, model: &str, _ctx: &ClassifyContext) -> std::result::Result<ClassifyResponse, ProviderError> {
            Ok(ClassifyResponse {
                result: ClassifyResult {
                    topic: Some("billing".to_string()),
                    urgency: Some(csintel_core::types::Urgency::Medium),
                    confidence: Some(0.9),
                    summary: Some("customer asking about invoice".to_string()),
                    ..Default::default()
                },
                model: model.to_string(),
                prompt_tokens: 50,
                completion_tokens: 20,
                latency_ms: 5,
            })
        }
    }

    /// `EventStore` and `AnnotationStore` each open their own connection to
    /// the same on-disk file, exactly as they do in the gateway binary —
    /// `list_unclassified_event_ids`'s join across `events` and
    /// `llm_annotations` only works when both tables live in one file, which
    /// an in-memory `:memory:` database can't model across two connections.
    fn setup() -> (AnnotationStore, Arc<EventStore>, Arc<TicketStore>) {
        let suffix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("csintel-classifier-test-{suffix}.db"));

        let events_conn = rusqlite::Connection::open(&path).unwrap();
        csintel_events::db::init_db(&events_conn).unwrap();
        crate::db::init_db(&events_conn).unwrap();

        let annotations_conn = rusqlite::Connection::open(&path).unwrap();

        let tickets_conn = rusqlite::Connection::open_in_memory().unwrap();
        csintel_tickets::db::init_db(&tickets_conn).unwrap();

        (
            AnnotationStore::new(annotations_conn),
            Arc::new(EventStore::new(events_conn)),
            Arc::new(TicketStore::new(tickets_conn)),
        )
    }

    #[tokio::test]
    async fn run_once_is_a_noop_with_no_unclassified_events() {
        let (annotations, events, tickets) = setup();
        let router = ClassifierRouter::new(Box::new(StubFast), Box::new(StubFast), "fast".into(), "escalation".into());
        let worker = ClassifierWorker::new(annotations, events, tickets, router, 16, 200_000);
        assert_eq!(worker.run_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn skips_events_with_no_bound_ticket() {
        let (annotations, events, tickets) = setup();
        let outcome = events
            .insert(
                NewMessageEvent {
                    device_id: "d".into(),
                    chat_room: "room".into(),
                    sender_name: "customer".into(),
                    text_raw: "hello".into(),
                    received_at: chrono::Utc::now(),
                    notification_id: None,
                },
                10,
            )
            .unwrap();
        // Intentionally not bound to a ticket.
        let _ = outcome.event.id;

        let router = ClassifierRouter::new(Box::new(StubFast), Box::new(StubFast), "fast".into(), "escalation".into());
        let worker = ClassifierWorker::new(annotations, events, tickets, router, 16, 200_000);
        // The event is a real unclassified candidate (shared file with
        // `events`), but has no bound ticket yet, so it's skipped without
        // being marked terminal — and without consuming a `processed` slot.
        assert_eq!(worker.run_once().await.unwrap(), 0);
        let _ = EventKind::Customer;
    }
}
