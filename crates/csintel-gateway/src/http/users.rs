use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use csintel_core::types::UserRole;
use csintel_users::UserProfile;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::require_admin;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    require_admin(&state, &headers)?;
    let users = state.users.list()?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    require_admin(&state, &headers)?;
    let user = state.users.create(&req.name, &req.email, &req.password, req.role)?;
    Ok(Json((&user).into()))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;
    state.users.delete(&id)?;
    Ok(Json(json!({ "ok": true })))
}
