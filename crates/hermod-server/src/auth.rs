//! Request authentication.

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::config::ServerConfig;

/// Middleware requiring the `apikey` header to match the configured
/// key. An empty configured key disables authentication (development
/// convenience).
pub async fn require_api_key(
    State(config): State<std::sync::Arc<ServerConfig>>,
    request: Request,
    next: Next,
) -> Response {
    if config.api_key.is_empty() {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get("apikey")
        .and_then(|value| value.to_str().ok());

    if presented == Some(config.api_key.as_str()) {
        next.run(request).await
    } else {
        let body = json!({
            "status": 401,
            "error": "Unauthorized",
            "message": "missing or invalid api key",
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
