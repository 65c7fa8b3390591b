use axum::http::HeaderMap;
use csintel_core::error::CsIntelError;
use csintel_core::types::UserRole;
use csintel_users::Claims;

use crate::app::AppState;
use crate::error::ApiError;

/// Strips the `"Bearer "` prefix from the `authorization` header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Any signed-in dashboard user: decodes and verifies the bearer JWT.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let token = extract_bearer(headers)
        .ok_or_else(|| ApiError(CsIntelError::Unauthorized("missing bearer token".into())))?;
    csintel_users::verify_token(token, &state.config.jwt_secret).map_err(|e| ApiError(e.into()))
}

/// `admin`-only dashboard routes (user management, manual learning trigger).
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let claims = require_user(state, headers)?;
    if claims.role() != UserRole::Admin {
        return Err(ApiError(CsIntelError::Unauthorized("admin role required".into())));
    }
    Ok(claims)
}

/// The mobile collector's shared secret.
pub fn require_device_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers.get("x-device-key").and_then(|v| v.to_str().ok());
    if provided == Some(state.config.device_key.as_str()) {
        Ok(())
    } else {
        Err(ApiError(CsIntelError::Unauthorized("invalid or missing X-DEVICE-KEY".into())))
    }
}
