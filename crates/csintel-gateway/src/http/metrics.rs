use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct MetricsOverview {
    pub sla_breached_count: u32,
    pub urgent_count: u32,
    pub open_tickets: u32,
    pub avg_response_sec: Option<f64>,
    pub today_inbound: u64,
}

/// GET /v1/metrics/overview — combines the ticket engine's aggregate counts
/// with today's customer inbound volume, which lives on the events table
/// rather than the tickets table.
pub async fn metrics_overview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MetricsOverview>, ApiError> {
    require_user(&state, &headers)?;

    let metrics = state.tickets.metrics_overview()?;
    let today_start = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    let today_inbound = state.events.count_customer_events_since(today_start)?;

    Ok(Json(MetricsOverview {
        sla_breached_count: metrics.sla_breached_count,
        urgent_count: metrics.urgent_count,
        open_tickets: metrics.open_tickets,
        avg_response_sec: metrics.avg_response_sec,
        today_inbound,
    }))
}
