use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use csintel_classifier::ProviderError;
use csintel_core::types::{LearningStatus, TriggerType};
use csintel_events::EventStore;
use csintel_tickets::TicketStore;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Duration};
use tracing::{info, instrument, warn};

use crate::corpus::{render_prompt, SampledTicket};
use crate::error::{LearningError, Result};
use crate::provider::SummaryProvider;
use crate::store::LearningStore;
use crate::types::{LearningExecution, Understanding};

const RETRY_BASE_MS: u64 = 1000;
const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Caps the corpus window so a long-idle deployment doesn't hand the model a
/// year of chat history in one call.
const DEFAULT_MAX_EVENTS: usize = 4000;
const DEFAULT_MAX_TICKETS_SAMPLED: usize = 300;

pub struct JobOutcome {
    pub execution: LearningExecution,
    pub understanding: Option<Understanding>,
}

/// The self-learning job. `running` is a singleton guard: a second
/// concurrent run observes the lock already held and returns
/// `AlreadyRunning` without touching the store.
pub struct LearningJob {
    store: LearningStore,
    events: Arc<EventStore>,
    tickets: Arc<TicketStore>,
    provider: Box<dyn SummaryProvider>,
    model: String,
    max_events: usize,
    max_tickets_sampled: usize,
    running: AsyncMutex<()>,
}

impl LearningJob {
    pub fn new(store: LearningStore, events: Arc<EventStore>, tickets: Arc<TicketStore>, provider: Box<dyn SummaryProvider>, model: String) -> Self {
        Self {
            store,
            events,
            tickets,
            provider,
            model,
            max_events: DEFAULT_MAX_EVENTS,
            max_tickets_sampled: DEFAULT_MAX_TICKETS_SAMPLED,
            running: AsyncMutex::new(()),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, trigger_type: TriggerType) -> Result<JobOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            return Err(LearningError::AlreadyRunning);
        };

        let started = Instant::now();
        let execution = self.store.open_execution(trigger_type)?;
        info!(execution_id = %execution.id, ?trigger_type, "self-learning run started");

        let since = self
            .store
            .last_successful_logs_date_to()?
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap());
        let events = self.events.list_since(since, self.max_events)?;
        let logs_date_to = events.last().map(|e| e.server_received_at).unwrap_or_else(Utc::now);
        let logs_date_from = events.first().map(|e| e.server_received_at);

        let mut sampled: Vec<SampledTicket> = Vec::new();
        let mut seen_tickets = std::collections::HashSet::new();
        for event in &events {
            let Some(ticket_id) = &event.ticket_id else { continue };
            if !seen_tickets.insert(ticket_id.clone()) {
                continue;
            }
            if sampled.len() >= self.max_tickets_sampled {
                break;
            }
            let Some(ticket) = self.tickets.get(ticket_id)? else { continue };
            let turns = self.events.list_for_ticket(ticket_id, 20)?;
            sampled.push(SampledTicket { ticket, turns });
        }

        let previous = self.store.latest_understanding()?;
        let prompt = render_prompt(previous.as_ref().map(|u| u.understanding_text.as_str()), &sampled);

        match call_with_retry(self.provider.as_ref(), &self.model, &prompt).await {
            Ok(resp) => {
                let understanding = self.store.close_success(
                    &execution.id,
                    events.len() as u32,
                    logs_date_from,
                    logs_date_to,
                    &resp.understanding_text,
                    &resp.key_insights,
                    &resp.model,
                    resp.prompt_tokens,
                    resp.completion_tokens,
                    started.elapsed().as_secs_f64(),
                )?;
                info!(execution_id = %execution.id, version = understanding.version, "self-learning run succeeded");
                Ok(JobOutcome {
                    execution: LearningExecution { status: LearningStatus::Success, ..execution },
                    understanding: Some(understanding),
                })
            }
            Err(e) => {
                warn!(execution_id = %execution.id, err = %e, "self-learning run failed");
                self.store.close_failed(&execution.id, LearningStatus::Failed, &e.to_string(), started.elapsed().as_secs_f64())?;
                Ok(JobOutcome {
                    execution: LearningExecution {
                        status: LearningStatus::Failed,
                        error_message: Some(e.to_string()),
                        ..execution
                    },
                    understanding: None,
                })
            }
        }
    }

    pub fn list_executions(&self, limit: usize) -> Result<Vec<LearningExecution>> {
        self.store.list_executions(limit)
    }

    pub fn latest_understanding(&self) -> Result<Option<Understanding>> {
        self.store.latest_understanding()
    }

    pub fn get_understanding(&self, version: u32) -> Result<Understanding> {
        self.store.get_understanding(version)
    }

    pub fn history(&self, limit: usize) -> Result<Vec<Understanding>> {
        self.store.history(limit)
    }
}

async fn call_with_retry(provider: &dyn SummaryProvider, model: &str, prompt: &str) -> Result<crate::provider::SummaryResponse> {
    let mut delay_ms = RETRY_BASE_MS;
    let mut last_err = None;

    for attempt in 1..=RETRY_MAX_ATTEMPTS {
        match provider.summarize(model, prompt).await {
            Ok(resp) => return Ok(resp),
            Err(e) if !e.is_transient() || attempt == RETRY_MAX_ATTEMPTS => {
                return Err(LearningError::Provider(e));
            }
            Err(e) => {
                warn!(attempt, err = %e, "summarize call failed, retrying");
                last_err = Some(e);
                sleep(Duration::from_millis(jittered(delay_ms))).await;
                delay_ms *= 2;
            }
        }
    }

    Err(LearningError::Provider(last_err.unwrap_or(ProviderError::Unavailable("retry loop exhausted".to_string()))))
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
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubSummarizer {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SummaryProvider for StubSummarizer {
        async fn summarize(&self, model: &str, _prompt: &str) -> std::result::Result<crate::provider::SummaryResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(crate::provider::SummaryResponse {
                understanding_text: "customers mostly ask about scheduling".to_string(),
                key_insights: vec!["morning slots fill fastest".to_string()],
                model: model.to_string(),
                prompt_tokens: 200,
                completion_tokens: 80,
            })
        }
    }

    fn job_with(provider: Box<dyn SummaryProvider>) -> LearningJob {
        let learning_conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&learning_conn).unwrap();
        let events_conn = Connection::open_in_memory().unwrap();
        csintel_events::db::init_db(&events_conn).unwrap();
        let tickets_conn = Connection::open_in_memory().unwrap();
        csintel_tickets::db::init_db(&tickets_conn).unwrap();

        LearningJob::new(
            LearningStore::new(learning_conn),
            Arc::new(EventStore::new(events_conn)),
            Arc::new(TicketStore::new(tickets_conn)),
            provider,
            "claude-summary".to_string(),
        )
    }

    #[tokio::test]
    async fn s6_first_run_with_no_prior_understanding_allocates_version_one() {
        let job = job_with(Box::new(StubSummarizer { calls: AtomicU32::new(0) }));
        let outcome = job.run(TriggerType::Manual).await.unwrap();
        assert_eq!(outcome.execution.status, LearningStatus::Success);
        assert_eq!(outcome.understanding.unwrap().version, 1);
    }

    #[tokio::test]
    async fn s6_concurrent_trigger_while_running_is_rejected() {
        let job = Arc::new(job_with(Box::new(StubSummarizer { calls: AtomicU32::new(0) })));
        let guard = job.running.try_lock().unwrap();
        let result = job.run(TriggerType::Manual).await;
        assert!(matches!(result, Err(LearningError::AlreadyRunning)));
        drop(guard);
    }
}
