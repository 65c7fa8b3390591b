use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use csintel_core::types::{Priority, TicketStatus};
use csintel_tickets::{Ticket, TicketFilter, TicketPatch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

/// Query params for `GET /v1/tickets`.
#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub clinic_key: Option<String>,
    pub sla_breached: Option<bool>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

impl From<TicketQuery> for TicketFilter {
    fn from(q: TicketQuery) -> Self {
        TicketFilter {
            status: q.status,
            priority: q.priority,
            clinic_key: q.clinic_key,
            sla_breached: q.sla_breached,
            page: q.page,
            limit: q.limit,
        }
    }
}

/// A ticket enriched with the live SLA countdown, computed at
/// read time rather than stored, so it's always correct relative to `now`.
#[derive(Debug, Serialize)]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub sla_remaining_sec: Option<i64>,
}

fn to_view(ticket: Ticket, state: &AppState) -> TicketView {
    let threshold_secs = i64::from(state.config.sla_threshold_minutes) * 60;
    let sla_remaining_sec = ticket.sla_remaining_sec(Utc::now(), threshold_secs);
    TicketView { ticket, sla_remaining_sec }
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TicketQuery>,
) -> Result<Json<Vec<TicketView>>, ApiError> {
    require_user(&state, &headers)?;
    let tickets = state.tickets.list(&query.into())?;
    Ok(Json(tickets.into_iter().map(|t| to_view(t, &state)).collect()))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TicketView>, ApiError> {
    require_user(&state, &headers)?;
    let ticket = state
        .tickets
        .get(&id)?
        .ok_or_else(|| ApiError(csintel_core::error::CsIntelError::Validation(format!("ticket not found: {id}"))))?;
    Ok(Json(to_view(ticket, &state)))
}

pub async fn patch_ticket(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<TicketPatch>,
) -> Result<Json<TicketView>, ApiError> {
    require_user(&state, &headers)?;
    let ticket = state.tickets.patch(&id, patch).await?;
    Ok(Json(to_view(ticket, &state)))
}

/// Messages of the ticket, returned oldest-first for a transcript read.
const TICKET_EVENTS_LIMIT: usize = 200;

pub async fn list_ticket_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<csintel_events::MessageEvent>>, ApiError> {
    require_user(&state, &headers)?;
    let events = state.events.list_for_ticket(&id, TICKET_EVENTS_LIMIT)?;
    Ok(Json(events))
}
