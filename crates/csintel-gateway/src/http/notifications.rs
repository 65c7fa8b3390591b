use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use csintel_tickets::Notification;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::require_user;
use crate::error::ApiError;

const NOTIFICATIONS_LIMIT: u32 = 100;

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, ApiError> {
    require_user(&state, &headers)?;
    Ok(Json(state.notifications.list(NOTIFICATIONS_LIMIT)?))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_user(&state, &headers)?;
    state.notifications.mark_read(&id)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_user(&state, &headers)?;
    state.notifications.mark_all_read()?;
    Ok(Json(json!({ "ok": true })))
}
