use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use csintel_core::types::TriggerType;
use csintel_learning::{LearningExecution, Understanding};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::{require_admin, require_user};
use crate::error::ApiError;

const HISTORY_LIMIT: usize = 50;
const EXECUTIONS_LIMIT: usize = 50;

pub async fn latest_understanding(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Option<Understanding>>, ApiError> {
    require_user(&state, &headers)?;
    Ok(Json(state.learning.latest_understanding()?))
}

pub async fn get_understanding(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(version): Path<u32>,
) -> Result<Json<Understanding>, ApiError> {
    require_user(&state, &headers)?;
    Ok(Json(state.learning.get_understanding(version)?))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Understanding>>, ApiError> {
    require_user(&state, &headers)?;
    Ok(Json(state.learning.history(HISTORY_LIMIT)?))
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub execution: LearningExecution,
    pub understanding: Option<Understanding>,
}

/// POST /v1/learning/run — manual trigger, admin-gated.
pub async fn run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RunResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let outcome = state.learning.run(TriggerType::Manual).await?;
    Ok(Json(RunResponse { execution: outcome.execution, understanding: outcome.understanding }))
}

/// GET /v1/learning/executions — the run log backing a dashboard history
/// view, alongside `history`'s
/// `Understanding`-only listing.
pub async fn executions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<LearningExecution>>, ApiError> {
    require_user(&state, &headers)?;
    Ok(Json(state.learning.list_executions(EXECUTIONS_LIMIT)?))
}
