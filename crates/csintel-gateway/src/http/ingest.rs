use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use csintel_events::NewMessageEvent;
use csintel_tickets::types::EventKind;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::require_device_key;
use crate::error::ApiError;

/// POST /v1/events — the mobile collector's `submit_event`.
///
/// The ticket transition only runs for a genuinely new event; a deduped
/// resend reports the ticket the original delivery already landed on
/// instead of mutating the state machine a second time.
pub async fn submit_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(new_event): Json<NewMessageEvent>,
) -> Result<Json<Value>, ApiError> {
    require_device_key(&state, &headers)?;

    let outcome = state.events.insert(new_event, state.config.dedup_window_seconds)?;

    let ticket_id = if !outcome.deduped {
        bind_to_ticket(&state, &outcome.event).await?
    } else {
        match &outcome.event.ticket_id {
            Some(id) => id.clone(),
            None => bind_to_ticket(&state, &outcome.event).await?,
        }
    };

    Ok(Json(json!({
        "ok": true,
        "event_id": outcome.event.id,
        "deduped": outcome.deduped,
        "ticket_id": ticket_id,
    })))
}

async fn bind_to_ticket(state: &AppState, event: &csintel_events::MessageEvent) -> Result<String, ApiError> {
    let kind = if event.is_staff() { EventKind::Staff } else { EventKind::Customer };
    let ticket = state.tickets.apply_event(&event.chat_room, kind, event.received_at).await?;
    state.events.bind_ticket(&event.id, &ticket.id)?;
    Ok(ticket.id)
}

/// POST /v1/heartbeat — collector liveness ping, ambient to the ingest surface.
pub async fn heartbeat(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    require_device_key(&state, &headers)?;
    Ok(Json(json!({ "ok": true, "server_time": Utc::now().to_rfc3339() })))
}
