use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use csintel_core::config::Config;
use csintel_events::EventStore;
use csintel_learning::LearningJob;
use csintel_scheduler::SchedulerHandle;
use csintel_tickets::{NotificationStore, TicketStore};
use csintel_users::UserStore;

use crate::slack::SlackClient;

/// Central shared state, passed as `Arc<AppState>` to every handler.
pub struct AppState {
    pub config: Config,
    pub events: Arc<EventStore>,
    pub tickets: Arc<TicketStore>,
    pub notifications: Arc<NotificationStore>,
    pub learning: Arc<LearningJob>,
    pub users: Arc<UserStore>,
    pub scheduler: Arc<SchedulerHandle>,
    pub slack: Option<SlackClient>,
}

/// Assemble the full Axum router: ingest, dashboard auth, tickets,
/// notifications, metrics, learning, and user administration.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/v1/events", post(crate::http::ingest::submit_event))
        .route("/v1/heartbeat", post(crate::http::ingest::heartbeat))
        .route("/auth/login", post(crate::http::login::login))
        .route(
            "/v1/tickets",
            get(crate::http::tickets::list_tickets),
        )
        .route(
            "/v1/tickets/{id}",
            get(crate::http::tickets::get_ticket).patch(crate::http::tickets::patch_ticket),
        )
        .route(
            "/v1/tickets/{id}/events",
            get(crate::http::tickets::list_ticket_events),
        )
        .route(
            "/v1/metrics/overview",
            get(crate::http::metrics::metrics_overview),
        )
        .route(
            "/v1/learning/understanding",
            get(crate::http::learning::latest_understanding),
        )
        .route(
            "/v1/learning/understanding/{version}",
            get(crate::http::learning::get_understanding),
        )
        .route("/v1/learning/history", get(crate::http::learning::history))
        .route("/v1/learning/executions", get(crate::http::learning::executions))
        .route("/v1/learning/run", post(crate::http::learning::run))
        .route(
            "/v1/notifications",
            get(crate::http::notifications::list),
        )
        .route(
            "/v1/notifications/read-all",
            post(crate::http::notifications::mark_all_read),
        )
        .route(
            "/v1/notifications/{id}/read",
            post(crate::http::notifications::mark_read),
        )
        .route(
            "/v1/users",
            get(crate::http::users::list).post(crate::http::users::create),
        )
        .route("/v1/users/{id}", delete(crate::http::users::delete_user))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
