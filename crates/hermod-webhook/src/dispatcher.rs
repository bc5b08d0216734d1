//! Event fan-out to webhook subscribers.
//!
//! `dispatch` processes every matching enabled subscriber in parallel
//! and returns once all deliveries have settled. Delivery failures are
//! recorded in stats and the circuit breaker but never surface to the
//! event producer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

use hermod_core::error::HermodResult;
use hermod_core::events::EventKind;
use hermod_core::models::webhook::{RetryConfig, WebhookSubscriber};
use hermod_core::repository::WebhookRepository;

use crate::auth::build_auth_headers;
use crate::breaker::{CircuitBreakerSet, GateDecision};
use crate::signature::sign_payload;
use crate::stats::StatsRecorder;

/// How one subscriber's delivery settled. Returned from the direct
/// test path and otherwise only logged.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub webhook_id: Uuid,
    pub delivered: bool,
    /// HTTP attempts actually issued.
    pub attempts: u32,
    /// Set when the pipeline skipped before any attempt.
    pub skipped: Option<String>,
    pub error: Option<String>,
}

impl DeliveryReport {
    fn skipped(webhook_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            webhook_id,
            delivered: false,
            attempts: 0,
            skipped: Some(reason.into()),
            error: None,
        }
    }
}

struct Inner<R: WebhookRepository> {
    repo: Arc<R>,
    breakers: CircuitBreakerSet,
    stats: StatsRecorder<R>,
    client: reqwest::Client,
}

/// Fan-out dispatcher over the subscriber repository.
pub struct WebhookDispatcher<R: WebhookRepository + 'static> {
    inner: Arc<Inner<R>>,
}

impl<R: WebhookRepository + 'static> Clone for WebhookDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: WebhookRepository + 'static> WebhookDispatcher<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self::with_breakers(repo, CircuitBreakerSet::new())
    }

    /// Custom breaker configuration, used by tests to shrink cooldowns.
    pub fn with_breakers(repo: Arc<R>, breakers: CircuitBreakerSet) -> Self {
        Self {
            inner: Arc::new(Inner {
                stats: StatsRecorder::new(repo.clone()),
                repo,
                breakers,
                client: reqwest::Client::new(),
            }),
        }
    }

    /// Fan an event out to every matching enabled subscriber.
    ///
    /// Subscribers are processed concurrently; the call returns after
    /// all of them settle. Dropping the returned future aborts pending
    /// retries mid-sleep.
    pub async fn dispatch(
        &self,
        event: EventKind,
        payload: serde_json::Value,
        instance: Option<String>,
    ) {
        let subscribers = match self.inner.repo.list_enabled().await {
            Ok(subscribers) => subscribers,
            Err(error) => {
                warn!(%event, %error, "failed to load webhook subscribers, dropping event");
                return;
            }
        };

        let payload = Arc::new(payload);
        let instance = instance.map(Arc::<str>::from);

        let mut tasks = JoinSet::new();
        for subscriber in subscribers {
            let inner = self.inner.clone();
            let payload = payload.clone();
            let instance = instance.clone();
            tasks.spawn(async move {
                let report = deliver(
                    &inner,
                    &subscriber,
                    event,
                    &payload,
                    instance.as_deref(),
                    true,
                )
                .await;
                if let Some(reason) = &report.skipped {
                    debug!(webhook = %subscriber.name, %event, %reason, "delivery skipped");
                }
            });
        }

        while tasks.join_next().await.is_some() {}
    }

    /// Deliver a synthetic event to one subscriber, ignoring event and
    /// instance filters, so operators can exercise the real delivery
    /// path. The breaker, retry config and stats all apply.
    pub async fn dispatch_to(
        &self,
        id: Uuid,
        event: EventKind,
        payload: serde_json::Value,
        instance: Option<String>,
    ) -> HermodResult<DeliveryReport> {
        let subscriber = self.inner.repo.get_by_id(id).await?;
        Ok(deliver(
            &self.inner,
            &subscriber,
            event,
            &payload,
            instance.as_deref(),
            false,
        )
        .await)
    }
}

async fn deliver<R: WebhookRepository>(
    inner: &Inner<R>,
    subscriber: &WebhookSubscriber,
    event: EventKind,
    payload: &serde_json::Value,
    instance: Option<&str>,
    honor_filters: bool,
) -> DeliveryReport {
    if honor_filters {
        if !subscriber.enabled {
            return DeliveryReport::skipped(subscriber.id, "subscriber disabled");
        }
        if !subscriber.events.is_empty() && !subscriber.events.contains(&event) {
            return DeliveryReport::skipped(subscriber.id, "event not subscribed");
        }

        let filter = &subscriber.filter_config;
        if !filter.instances.is_empty()
            && !instance.is_some_and(|name| filter.instances.iter().any(|i| i == name))
        {
            return DeliveryReport::skipped(subscriber.id, "instance not in allow-list");
        }
        if let Some(name) = instance
            && filter.exclude_instances.iter().any(|i| i == name)
        {
            return DeliveryReport::skipped(subscriber.id, "instance excluded");
        }
    }

    if inner.breakers.check_gate(subscriber.id) == GateDecision::Deny {
        warn!(webhook = %subscriber.name, "circuit open, delivery suppressed");
        return DeliveryReport::skipped(subscriber.id, "circuit open");
    }

    let envelope = json!({
        "event": event.as_str(),
        "instance": instance,
        "data": payload,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "webhook": { "id": subscriber.id, "name": subscriber.name },
    });
    let body = match serde_json::to_vec(&envelope) {
        Ok(body) => body,
        Err(error) => {
            let message = format!("failed to encode envelope: {error}");
            warn!(webhook = %subscriber.name, %error, "envelope encoding failed");
            inner
                .stats
                .record_failure(subscriber.id, message.clone(), 0)
                .await;
            return DeliveryReport {
                webhook_id: subscriber.id,
                delivered: false,
                attempts: 0,
                skipped: None,
                error: Some(message),
            };
        }
    };

    let headers = match build_headers(subscriber, &body) {
        Ok(headers) => headers,
        Err(message) => {
            warn!(webhook = %subscriber.name, %message, "header construction failed");
            inner
                .stats
                .record_failure(subscriber.id, message.clone(), 0)
                .await;
            return DeliveryReport {
                webhook_id: subscriber.id,
                delivered: false,
                attempts: 0,
                skipped: None,
                error: Some(message),
            };
        }
    };

    run_attempts(inner, subscriber, body, headers).await
}

/// The retry loop: one HTTP POST per attempt, bounded by
/// `retry_config.max_attempts`, sleeping the configured backoff between
/// retryable failures.
async fn run_attempts<R: WebhookRepository>(
    inner: &Inner<R>,
    subscriber: &WebhookSubscriber,
    body: Vec<u8>,
    headers: HeaderMap,
) -> DeliveryReport {
    let retry = &subscriber.retry_config;
    let timeout = Duration::from_millis(subscriber.timeout_ms);
    let mut last_error = String::new();

    for attempt in 1..=retry.max_attempts {
        let started = Instant::now();
        let response = inner
            .client
            .post(&subscriber.url)
            .timeout(timeout)
            .headers(headers.clone())
            .body(body.clone())
            .send()
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    debug!(
                        webhook = %subscriber.name,
                        status = status.as_u16(),
                        attempt,
                        duration_ms,
                        "delivery succeeded"
                    );
                    inner.stats.record_success(subscriber.id, duration_ms).await;
                    inner.breakers.record_success(subscriber.id);
                    return DeliveryReport {
                        webhook_id: subscriber.id,
                        delivered: true,
                        attempts: attempt,
                        skipped: None,
                        error: None,
                    };
                }

                let code = status.as_u16();
                last_error = format!("HTTP {status}");
                if retry.non_retryable_status_codes.contains(&code) {
                    warn!(
                        webhook = %subscriber.name,
                        status = code,
                        "non-retryable status, giving up"
                    );
                    inner
                        .stats
                        .record_failure(subscriber.id, last_error.clone(), duration_ms)
                        .await;
                    inner.breakers.record_failure(subscriber.id);
                    return DeliveryReport {
                        webhook_id: subscriber.id,
                        delivered: false,
                        attempts: attempt,
                        skipped: None,
                        error: Some(last_error),
                    };
                }
            }
            Err(error) => {
                last_error = error.to_string();
            }
        }

        if attempt == retry.max_attempts {
            warn!(
                webhook = %subscriber.name,
                attempts = attempt,
                error = %last_error,
                "delivery failed, retries exhausted"
            );
            inner
                .stats
                .record_failure(subscriber.id, last_error.clone(), duration_ms)
                .await;
            inner.breakers.record_failure(subscriber.id);
            return DeliveryReport {
                webhook_id: subscriber.id,
                delivered: false,
                attempts: attempt,
                skipped: None,
                error: Some(last_error),
            };
        }

        let backoff = backoff_delay(retry, attempt);
        debug!(
            webhook = %subscriber.name,
            attempt,
            error = %last_error,
            backoff_ms = backoff.as_millis() as u64,
            "delivery attempt failed, backing off"
        );
        tokio::time::sleep(backoff).await;
    }

    // Only reachable with max_attempts == 0, which validation rejects.
    DeliveryReport {
        webhook_id: subscriber.id,
        delivered: false,
        attempts: 0,
        skipped: None,
        error: Some("no delivery attempts configured".into()),
    }
}

/// Backoff before the attempt after `attempt` (1-indexed).
///
/// Exponential: base doubles per attempt up to `max_delay_seconds`, with
/// symmetric jitter of `jitter_factor` applied and the result clamped
/// to at least the initial delay. Fixed mode just waits the initial
/// delay.
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let initial = retry.initial_delay_seconds as f64;
    if !retry.use_exponential_backoff {
        return Duration::from_secs_f64(initial);
    }

    let exponent = attempt.saturating_sub(1).min(32);
    let base = (initial * f64::from(2u32.saturating_pow(exponent)))
        .min(retry.max_delay_seconds as f64);
    let jitter = if retry.jitter_factor > 0.0 {
        base * retry.jitter_factor * rand::rng().random_range(-1.0..=1.0)
    } else {
        0.0
    };
    Duration::from_secs_f64((base + jitter).max(initial))
}

fn build_headers(subscriber: &WebhookSubscriber, body: &[u8]) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in &subscriber.headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| format!("invalid header name '{name}': {e}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| format!("invalid value for header '{name:?}': {e}"))?;
        headers.insert(name, value);
    }

    for (name, value) in build_auth_headers(&subscriber.authentication)
        .map_err(|e| format!("auth header construction: {e}"))?
    {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| format!("invalid auth header name '{name}': {e}"))?;
        let value =
            HeaderValue::from_str(&value).map_err(|e| format!("invalid auth header value: {e}"))?;
        headers.insert(name, value);
    }

    let security = &subscriber.security_config;
    if security.enable_signature_validation {
        let Some(secret) = &security.signature_secret else {
            return Err("signature validation enabled without a secret".into());
        };
        let signature = sign_payload(security.signature_algorithm, secret, body);
        let name = HeaderName::try_from(security.signature_header.as_str())
            .map_err(|e| format!("invalid signature header name: {e}"))?;
        let value = HeaderValue::from_str(&signature)
            .map_err(|e| format!("invalid signature header value: {e}"))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry(initial: u64, max: u64, exponential: bool, jitter: f64) -> RetryConfig {
        RetryConfig {
            max_attempts: 5,
            initial_delay_seconds: initial,
            use_exponential_backoff: exponential,
            max_delay_seconds: max,
            jitter_factor: jitter,
            non_retryable_status_codes: vec![],
        }
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let config = retry(7, 300, false, 0.5);
        for attempt in 1..=4 {
            assert_eq!(backoff_delay(&config, attempt), Duration::from_secs(7));
        }
    }

    #[test]
    fn exponential_backoff_doubles_without_jitter() {
        let config = retry(1, 300, true, 0.0);
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(&config, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(&config, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(&config, 4), Duration::from_secs(8));
    }

    #[test]
    fn exponential_backoff_caps_at_max_delay() {
        let config = retry(10, 25, true, 0.0);
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(10));
        assert_eq!(backoff_delay(&config, 2), Duration::from_secs(20));
        assert_eq!(backoff_delay(&config, 3), Duration::from_secs(25));
        assert_eq!(backoff_delay(&config, 10), Duration::from_secs(25));
    }

    #[test]
    fn jitter_never_undershoots_initial_delay() {
        let config = retry(5, 300, true, 1.0);
        for attempt in 1..=6 {
            for _ in 0..50 {
                let delay = backoff_delay(&config, attempt);
                assert!(delay >= Duration::from_secs(5), "delay {delay:?} too short");
            }
        }
    }

    #[test]
    fn jitter_stays_within_band() {
        let config = retry(1, 300, true, 0.5);
        // attempt 3: base 4s, jitter ±2s.
        for _ in 0..50 {
            let delay = backoff_delay(&config, 3);
            assert!(delay >= Duration::from_secs(2) && delay <= Duration::from_secs(6));
        }
    }
}
