//! SurrealDB implementation of [`WebhookRepository`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hermod_core::error::HermodResult;
use hermod_core::events::EventKind;
use hermod_core::models::webhook::{
    CreateWebhook, ExecutionOutcome, ExecutionStatus, FilterConfig, RetryConfig, SecurityConfig,
    UpdateWebhook, WebhookAuth, WebhookStats, WebhookSubscriber,
};
use hermod_core::repository::WebhookRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, map_write_error};

/// DB-side row struct for queries where the UUID is already known.
///
/// Structured sub-configs are stored as FLEXIBLE objects and decoded
/// through `serde_json` on the way out.
#[derive(Debug, SurrealValue)]
struct WebhookRow {
    name: String,
    url: String,
    description: Option<String>,
    enabled: bool,
    events: Vec<String>,
    headers: serde_json::Value,
    authentication: serde_json::Value,
    retry_config: serde_json::Value,
    security_config: serde_json::Value,
    filter_config: serde_json::Value,
    timeout_ms: u64,
    total_executions: u64,
    successful_executions: u64,
    failed_executions: u64,
    last_execution_at: Option<DateTime<Utc>>,
    last_execution_status: Option<String>,
    last_execution_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WebhookRow {
    fn try_into_subscriber(self, id: Uuid) -> Result<WebhookSubscriber, DbError> {
        let events = self
            .events
            .iter()
            .map(|name| name.parse::<EventKind>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DbError::Migration(format!("stored event kind: {e}")))?;

        let headers: HashMap<String, String> = serde_json::from_value(self.headers)
            .map_err(|e| DbError::Migration(format!("stored headers: {e}")))?;
        let authentication: WebhookAuth = serde_json::from_value(self.authentication)
            .map_err(|e| DbError::Migration(format!("stored authentication: {e}")))?;
        let retry_config: RetryConfig = serde_json::from_value(self.retry_config)
            .map_err(|e| DbError::Migration(format!("stored retry config: {e}")))?;
        let security_config: SecurityConfig = serde_json::from_value(self.security_config)
            .map_err(|e| DbError::Migration(format!("stored security config: {e}")))?;
        let filter_config: FilterConfig = serde_json::from_value(self.filter_config)
            .map_err(|e| DbError::Migration(format!("stored filter config: {e}")))?;

        let last_execution_status = match self.last_execution_status.as_deref() {
            Some("success") => Some(ExecutionStatus::Success),
            Some("failed") => Some(ExecutionStatus::Failed),
            Some(other) => {
                return Err(DbError::Migration(format!(
                    "unknown execution status: {other}"
                )));
            }
            None => None,
        };

        Ok(WebhookSubscriber {
            id,
            name: self.name,
            url: self.url,
            description: self.description,
            enabled: self.enabled,
            events,
            headers,
            authentication,
            retry_config,
            security_config,
            filter_config,
            timeout_ms: self.timeout_ms,
            stats: WebhookStats {
                total_executions: self.total_executions,
                successful_executions: self.successful_executions,
                failed_executions: self.failed_executions,
                last_execution_at: self.last_execution_at,
                last_execution_status,
                last_execution_error: self.last_execution_error,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct WebhookRowWithId {
    record_id: String,
    name: String,
    url: String,
    description: Option<String>,
    enabled: bool,
    events: Vec<String>,
    headers: serde_json::Value,
    authentication: serde_json::Value,
    retry_config: serde_json::Value,
    security_config: serde_json::Value,
    filter_config: serde_json::Value,
    timeout_ms: u64,
    total_executions: u64,
    successful_executions: u64,
    failed_executions: u64,
    last_execution_at: Option<DateTime<Utc>>,
    last_execution_status: Option<String>,
    last_execution_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WebhookRowWithId {
    fn try_into_subscriber(self) -> Result<WebhookSubscriber, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        let row = WebhookRow {
            name: self.name,
            url: self.url,
            description: self.description,
            enabled: self.enabled,
            events: self.events,
            headers: self.headers,
            authentication: self.authentication,
            retry_config: self.retry_config,
            security_config: self.security_config,
            filter_config: self.filter_config,
            timeout_ms: self.timeout_ms,
            total_executions: self.total_executions,
            successful_executions: self.successful_executions,
            failed_executions: self.failed_executions,
            last_execution_at: self.last_execution_at,
            last_execution_status: self.last_execution_status,
            last_execution_error: self.last_execution_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        row.try_into_subscriber(id)
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn events_to_strings(events: &[EventKind]) -> Vec<String> {
    events.iter().map(|kind| kind.as_str().to_string()).collect()
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|e| DbError::Migration(format!("encode {what}: {e}")))
}

/// SurrealDB implementation of the webhook subscriber repository.
#[derive(Clone)]
pub struct SurrealWebhookRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealWebhookRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn count_name(&self, name: &str, exclude: Option<Uuid>) -> Result<u64, DbError> {
        let query = match exclude {
            Some(_) => {
                "SELECT count() AS total FROM external_webhook \
                 WHERE name = $name AND meta::id(id) != $exclude GROUP ALL"
            }
            None => {
                "SELECT count() AS total FROM external_webhook \
                 WHERE name = $name GROUP ALL"
            }
        };

        let mut builder = self.db.query(query).bind(("name", name.to_string()));
        if let Some(id) = exclude {
            builder = builder.bind(("exclude", id.to_string()));
        }

        let mut result = builder.await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn fetch_row(&self, id: Uuid) -> Result<WebhookRow, DbError> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM type::record('external_webhook', $id)")
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<WebhookRow> = result.take(0)?;
        rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "external_webhook".into(),
            id: id_str,
        })
    }

    async fn select_where(&self, clause: &str) -> Result<Vec<WebhookSubscriber>, DbError> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM external_webhook \
             {clause} ORDER BY created_at ASC"
        );
        let mut result = self.db.query(&query).await?;
        let rows: Vec<WebhookRowWithId> = result.take(0)?;
        rows.into_iter().map(|row| row.try_into_subscriber()).collect()
    }
}

impl<C: Connection> WebhookRepository for SurrealWebhookRepository<C> {
    async fn create(&self, input: CreateWebhook) -> HermodResult<WebhookSubscriber> {
        if self.count_name(&input.name, None).await? > 0 {
            return Err(DbError::UniqueViolation(format!(
                "webhook name '{}' already exists",
                input.name
            ))
            .into());
        }

        let id = Uuid::new_v4();

        let result = self
            .db
            .query(
                "CREATE type::record('external_webhook', $id) SET \
                 name = $name, url = $url, description = $description, \
                 enabled = $enabled, events = $events, \
                 headers = $headers, authentication = $authentication, \
                 retry_config = $retry_config, \
                 security_config = $security_config, \
                 filter_config = $filter_config, \
                 timeout_ms = $timeout_ms",
            )
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("url", input.url))
            .bind(("description", input.description))
            .bind(("enabled", input.enabled))
            .bind(("events", events_to_strings(&input.events)))
            .bind(("headers", to_json(&input.headers, "headers")?))
            .bind((
                "authentication",
                to_json(&input.authentication, "authentication")?,
            ))
            .bind(("retry_config", to_json(&input.retry_config, "retry config")?))
            .bind((
                "security_config",
                to_json(&input.security_config, "security config")?,
            ))
            .bind((
                "filter_config",
                to_json(&input.filter_config, "filter config")?,
            ))
            .bind(("timeout_ms", input.timeout_ms))
            .await
            .map_err(|e| map_write_error(e, "webhook name"))?;

        let mut result = result
            .check()
            .map_err(|e| map_write_error(e, "webhook name"))?;

        let rows: Vec<WebhookRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "external_webhook".into(),
            id: id.to_string(),
        })?;

        Ok(row.try_into_subscriber(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> HermodResult<WebhookSubscriber> {
        let row = self.fetch_row(id).await?;
        Ok(row.try_into_subscriber(id)?)
    }

    async fn get_by_name(&self, name: &str) -> HermodResult<WebhookSubscriber> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM external_webhook \
                 WHERE name = $name",
            )
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WebhookRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "external_webhook".into(),
            id: name.to_string(),
        })?;

        Ok(row.try_into_subscriber()?)
    }

    async fn update(&self, id: Uuid, input: UpdateWebhook) -> HermodResult<WebhookSubscriber> {
        if let Some(name) = &input.name
            && self.count_name(name, Some(id)).await? > 0
        {
            return Err(
                DbError::UniqueViolation(format!("webhook name '{name}' already exists")).into(),
            );
        }

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.url.is_some() {
            sets.push("url = $url");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.enabled.is_some() {
            sets.push("enabled = $enabled");
        }
        if input.events.is_some() {
            sets.push("events = $events");
        }
        if input.headers.is_some() {
            sets.push("headers = $headers");
        }
        if input.authentication.is_some() {
            sets.push("authentication = $authentication");
        }
        if input.retry_config.is_some() {
            sets.push("retry_config = $retry_config");
        }
        if input.security_config.is_some() {
            sets.push("security_config = $security_config");
        }
        if input.filter_config.is_some() {
            sets.push("filter_config = $filter_config");
        }
        if input.timeout_ms.is_some() {
            sets.push("timeout_ms = $timeout_ms");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('external_webhook', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(url) = input.url {
            builder = builder.bind(("url", url));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(enabled) = input.enabled {
            builder = builder.bind(("enabled", enabled));
        }
        if let Some(events) = input.events {
            builder = builder.bind(("events", events_to_strings(&events)));
        }
        if let Some(headers) = input.headers {
            builder = builder.bind(("headers", to_json(&headers, "headers")?));
        }
        if let Some(authentication) = input.authentication {
            builder = builder.bind((
                "authentication",
                to_json(&authentication, "authentication")?,
            ));
        }
        if let Some(retry_config) = input.retry_config {
            builder = builder.bind(("retry_config", to_json(&retry_config, "retry config")?));
        }
        if let Some(security_config) = input.security_config {
            builder = builder.bind((
                "security_config",
                to_json(&security_config, "security config")?,
            ));
        }
        if let Some(filter_config) = input.filter_config {
            builder = builder.bind(("filter_config", to_json(&filter_config, "filter config")?));
        }
        if let Some(timeout_ms) = input.timeout_ms {
            builder = builder.bind(("timeout_ms", timeout_ms));
        }

        let result = builder
            .await
            .map_err(|e| map_write_error(e, "webhook name"))?;
        let mut result = result
            .check()
            .map_err(|e| map_write_error(e, "webhook name"))?;

        let rows: Vec<WebhookRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "external_webhook".into(),
            id: id.to_string(),
        })?;

        Ok(row.try_into_subscriber(id)?)
    }

    async fn delete(&self, id: Uuid) -> HermodResult<()> {
        self.fetch_row(id).await?;

        self.db
            .query("DELETE type::record('external_webhook', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self) -> HermodResult<Vec<WebhookSubscriber>> {
        Ok(self.select_where("").await?)
    }

    async fn list_enabled(&self) -> HermodResult<Vec<WebhookSubscriber>> {
        Ok(self.select_where("WHERE enabled = true").await?)
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> HermodResult<WebhookSubscriber> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('external_webhook', $id) SET \
                 enabled = $enabled, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("enabled", enabled))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<WebhookRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "external_webhook".into(),
            id: id.to_string(),
        })?;

        Ok(row.try_into_subscriber(id)?)
    }

    async fn record_execution(&self, id: Uuid, outcome: ExecutionOutcome) -> HermodResult<()> {
        // A single UPDATE with `+=` keeps the counter increments atomic
        // on the storage side.
        let query = match outcome.status {
            ExecutionStatus::Success => {
                "UPDATE type::record('external_webhook', $id) SET \
                 total_executions += 1, successful_executions += 1, \
                 last_execution_at = time::now(), \
                 last_execution_status = 'success', \
                 last_execution_error = NONE, \
                 updated_at = time::now()"
            }
            ExecutionStatus::Failed => {
                "UPDATE type::record('external_webhook', $id) SET \
                 total_executions += 1, failed_executions += 1, \
                 last_execution_at = time::now(), \
                 last_execution_status = 'failed', \
                 last_execution_error = $error, \
                 updated_at = time::now()"
            }
        };

        let mut builder = self.db.query(query).bind(("id", id.to_string()));
        if outcome.status == ExecutionStatus::Failed {
            let error = outcome.error.unwrap_or_else(|| "delivery failed".into());
            builder = builder.bind(("error", error));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<WebhookRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "external_webhook".into(),
                id: id.to_string(),
            }
            .into());
        }

        Ok(())
    }
}
