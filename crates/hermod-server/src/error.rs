//! API error mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use hermod_core::error::HermodError;

/// Wrapper translating [`HermodError`] into HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub HermodError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<HermodError> for ApiError {
    fn from(err: HermodError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(HermodError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            HermodError::Validation { .. } | HermodError::Conflict { .. } => {
                StatusCode::BAD_REQUEST
            }
            HermodError::NotFound { .. } => StatusCode::NOT_FOUND,
            HermodError::Upstream(_) | HermodError::Database(_) | HermodError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({
            "status": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("error"),
            "message": self.0.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
