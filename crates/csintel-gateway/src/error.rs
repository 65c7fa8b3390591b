use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use csintel_core::error::CsIntelError;
use serde_json::json;

/// Wraps `CsIntelError` so every handler can return `Result<_, ApiError>` and
/// rely on `?` to convert any downstream crate's error type into the
/// `{ok:false, error:{code,message}}` envelope.
pub struct ApiError(pub CsIntelError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CsIntelError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CsIntelError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "ok": false,
            "error": { "code": self.0.code(), "message": self.0.to_string() },
        }));
        (status, body).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<CsIntelError>,
{
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}
