//! HTTP route handlers and router assembly.

pub mod instance_group;
pub mod message;
pub mod webhook;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, patch, post};
use surrealdb::Connection;
use tower_http::trace::TraceLayer;

use hermod_core::sender::TextSender;
use uuid::Uuid;

use crate::auth::require_api_key;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Parse a path segment as a UUID, surfacing a 400 on garbage.
pub(crate) fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError(hermod_core::error::HermodError::validation("invalid id")))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Assemble the full application router: api-key-guarded API plus an
/// unauthenticated health probe.
pub fn build_router<C, S>(state: AppState<C, S>) -> Router
where
    C: Connection + Clone,
    S: TextSender + 'static,
{
    let api = Router::new()
        .route(
            "/instance-group",
            post(instance_group::create).get(instance_group::list),
        )
        .route(
            "/instance-group/{id}",
            get(instance_group::get_by_id)
                .put(instance_group::update)
                .delete(instance_group::remove),
        )
        .route("/instance-group/name/{name}", get(instance_group::get_by_name))
        .route(
            "/instance-group/alias/{alias}",
            get(instance_group::get_by_alias),
        )
        .route(
            "/instance-group/{id}/addInstance",
            post(instance_group::add_instance),
        )
        .route(
            "/instance-group/{id}/removeInstance",
            post(instance_group::remove_instance),
        )
        .route(
            "/instance-group/{id}/activeInstances",
            get(instance_group::active_instances),
        )
        .route("/instance-group/{id}/stats", get(instance_group::stats))
        .route("/external-webhook", post(webhook::create).get(webhook::list))
        .route(
            "/external-webhook/{id}",
            get(webhook::get_by_id)
                .put(webhook::update)
                .delete(webhook::remove),
        )
        .route("/external-webhook/{id}/toggle", patch(webhook::toggle))
        .route("/external-webhook/{id}/stats", get(webhook::stats))
        .route("/external-webhook/{id}/test", post(webhook::test))
        .route(
            "/message/sendTextWithGroupBalancing",
            post(message::send_text_with_group_balancing),
        )
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            require_api_key,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
}
