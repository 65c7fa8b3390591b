use std::net::SocketAddr;
use std::sync::Arc;

use csintel_classifier::{AnnotationStore, AnthropicProvider, ClassifierRouter, ClassifierWorker};
use csintel_core::config::Config;
use csintel_events::EventStore;
use csintel_learning::{AnthropicSummaryProvider, LearningJob, LearningStore};
use csintel_scheduler::{SchedulerEngine, SchedulerHandle};
use csintel_tickets::{NotificationStore, TicketStore};
use csintel_users::UserStore;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

mod app;
mod auth;
mod classifier_loop;
mod error;
mod http;
mod jobs;
mod slack;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csintel_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("CSINTEL_CONFIG").ok();
    let config = Config::load(config_path.as_deref())?;

    if let Some(parent) = std::path::Path::new(&config.database_url).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let http_client = reqwest::Client::new();

    let events_conn = open_conn(&config, "events")?;
    csintel_events::db::init_db(&events_conn)?;
    let events = Arc::new(EventStore::new(events_conn));

    let tickets_conn = open_conn(&config, "tickets")?;
    csintel_tickets::db::init_db(&tickets_conn)?;
    let tickets = Arc::new(TicketStore::new(tickets_conn));

    let notifications_conn = open_conn(&config, "notifications")?;
    csintel_tickets::db::init_db(&notifications_conn)?;
    let notifications = Arc::new(NotificationStore::new(notifications_conn));

    let users_conn = open_conn(&config, "users")?;
    csintel_users::db::init_db(&users_conn)?;
    let users = Arc::new(UserStore::new(users_conn)?);

    let annotations_conn = open_conn(&config, "annotations")?;
    csintel_classifier::db::init_db(&annotations_conn)?;
    let annotations = AnnotationStore::new(annotations_conn);
    let fast = Box::new(AnthropicProvider::new(http_client.clone(), config.llm_api_key.clone(), None));
    let escalation = Box::new(AnthropicProvider::new(http_client.clone(), config.llm_api_key.clone(), None));
    let router = ClassifierRouter::new(fast, escalation, config.llm_model_fast.clone(), config.llm_model_escalation.clone());
    let classifier_worker = Arc::new(ClassifierWorker::new(
        annotations,
        events.clone(),
        tickets.clone(),
        router,
        config.classifier_batch_size,
        config.classifier_max_tokens_per_run,
    ));

    let learning_conn = open_conn(&config, "learning")?;
    csintel_learning::db::init_db(&learning_conn)?;
    let learning_store = LearningStore::new(learning_conn);
    let summary_provider = Box::new(AnthropicSummaryProvider::new(http_client.clone(), config.llm_api_key.clone(), None));
    let learning = Arc::new(LearningJob::new(
        learning_store,
        events.clone(),
        tickets.clone(),
        summary_provider,
        config.llm_model_escalation.clone(),
    ));

    let scheduler_handle = Arc::new(SchedulerHandle::new(open_conn(&config, "scheduler")?)?);
    jobs::bootstrap_default_jobs(&scheduler_handle, &config)?;

    let slack = config.slack_webhook_url.clone().map(|url| slack::SlackClient::new(http_client.clone(), url));

    let state = Arc::new(app::AppState {
        config: config.clone(),
        events,
        tickets,
        notifications,
        learning,
        users,
        scheduler: scheduler_handle,
        slack,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (fired_tx, mut fired_rx) = mpsc::channel(64);
    let scheduler_engine = SchedulerEngine::new(open_conn(&config, "scheduler")?, Some(fired_tx))?;

    let engine_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        scheduler_engine.run(engine_shutdown).await;
    });

    let dispatch_state = state.clone();
    tokio::spawn(async move {
        while let Some(job) = fired_rx.recv().await {
            jobs::dispatch_fired_job(job, dispatch_state.clone()).await;
        }
    });

    let classifier_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        classifier_loop::run(classifier_worker, classifier_shutdown).await;
    });

    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    info!("csintel gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(err = %e, "failed to install Ctrl+C handler");
            }
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

/// Every subsystem keeps its own `Connection` to the shared SQLite file and
/// bootstraps its own tables via that crate's `db::init_db` — the one
/// exception is `csintel-scheduler`, whose `SchedulerHandle`/`SchedulerEngine`
/// constructors call `init_db` internally.
fn open_conn(config: &Config, label: &str) -> anyhow::Result<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(&config.database_url)?;
    info!(label, path = %config.database_url, "opened SQLite connection");
    Ok(conn)
}
