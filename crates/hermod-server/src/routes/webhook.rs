//! Webhook subscriber management endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use surrealdb::Connection;

use hermod_core::events::EventKind;
use hermod_core::models::webhook::{
    self, CreateWebhook, UpdateWebhook, WebhookSubscriber,
};
use hermod_core::repository::WebhookRepository;
use hermod_core::sender::TextSender;

use crate::error::ApiResult;
use crate::routes::parse_id;
use crate::state::AppState;

fn validate_create(input: &CreateWebhook, allow_private: bool) -> ApiResult<()> {
    if input.name.is_empty() {
        return Err(hermod_core::error::HermodError::validation("name must not be empty").into());
    }
    webhook::validate_url(&input.url, allow_private)?;
    webhook::validate_retry_config(&input.retry_config)?;
    webhook::validate_security_config(&input.security_config)?;
    webhook::validate_timeout(input.timeout_ms)?;
    Ok(())
}

fn validate_update(input: &UpdateWebhook, allow_private: bool) -> ApiResult<()> {
    if let Some(url) = &input.url {
        webhook::validate_url(url, allow_private)?;
    }
    if let Some(retry_config) = &input.retry_config {
        webhook::validate_retry_config(retry_config)?;
    }
    if let Some(security_config) = &input.security_config {
        webhook::validate_security_config(security_config)?;
    }
    if let Some(timeout_ms) = input.timeout_ms {
        webhook::validate_timeout(timeout_ms)?;
    }
    Ok(())
}

pub async fn create<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    body: Result<Json<CreateWebhook>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = body?;
    validate_create(&input, state.config.dev_mode)?;

    let webhook = state.webhooks.create(input).await?;
    Ok((StatusCode::CREATED, Json(webhook)))
}

pub async fn list<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
) -> ApiResult<Json<Vec<WebhookSubscriber>>> {
    Ok(Json(state.webhooks.list().await?))
}

pub async fn get_by_id<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<WebhookSubscriber>> {
    let id = parse_id(&id)?;
    Ok(Json(state.webhooks.get_by_id(id).await?))
}

pub async fn update<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateWebhook>, JsonRejection>,
) -> ApiResult<Json<WebhookSubscriber>> {
    let id = parse_id(&id)?;
    let Json(input) = body?;
    validate_update(&input, state.config.dev_mode)?;

    Ok(Json(state.webhooks.update(id, input).await?))
}

pub async fn remove<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    state.webhooks.delete(id).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

/// Flip the enabled gate without touching the rest of the record.
pub async fn toggle<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<WebhookSubscriber>> {
    let id = parse_id(&id)?;
    let current = state.webhooks.get_by_id(id).await?;
    Ok(Json(
        state.webhooks.set_enabled(id, !current.enabled).await?,
    ))
}

pub async fn stats<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    let webhook = state.webhooks.get_by_id(id).await?;
    Ok(Json(json!({
        "id": webhook.id,
        "name": webhook.name,
        "enabled": webhook.enabled,
        "stats": webhook.stats,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct TestRequest {
    pub event: Option<EventKind>,
    pub data: Option<serde_json::Value>,
    pub instance: Option<String>,
}

/// Fire a synthetic delivery through the real pipeline so operators
/// can verify endpoint, auth and signature configuration.
pub async fn test<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
    body: Result<Json<TestRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    let request = match body {
        Ok(Json(request)) => request,
        // An empty body is fine for a test fire.
        Err(_) => TestRequest::default(),
    };

    let event = request.event.unwrap_or(EventKind::SendMessage);
    let payload = request.data.unwrap_or_else(|| json!({ "test": true }));

    let report = state
        .dispatcher
        .dispatch_to(id, event, payload, request.instance)
        .await?;

    Ok(Json(json!({
        "webhookId": report.webhook_id,
        "delivered": report.delivered,
        "attempts": report.attempts,
        "skipped": report.skipped,
        "error": report.error,
    })))
}
