use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: csintel_users::UserProfile,
}

/// POST /auth/login — dashboard sign-in.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state.users.authenticate(&req.email, &req.password)?;
    let token = csintel_users::issue_token(&user.id, user.role, &state.config.jwt_secret)?;
    Ok(Json(LoginResponse { token, user: (&user).into() }))
}
