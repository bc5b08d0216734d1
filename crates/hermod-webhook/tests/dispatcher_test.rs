//! Dispatcher integration tests against a local mock HTTP server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hermod_core::error::{HermodError, HermodResult};
use hermod_core::events::EventKind;
use hermod_core::models::webhook::{
    CreateWebhook, ExecutionOutcome, ExecutionStatus, FilterConfig, RetryConfig, SecurityConfig,
    SignatureAlgorithm, UpdateWebhook, WebhookAuth, WebhookStats, WebhookSubscriber,
};
use hermod_core::repository::WebhookRepository;
use hermod_webhook::{CircuitBreakerSet, WebhookDispatcher};

/// Minimal in-memory subscriber store for dispatcher tests.
#[derive(Default)]
struct InMemoryWebhooks {
    subscribers: Mutex<Vec<WebhookSubscriber>>,
}

impl InMemoryWebhooks {
    fn insert(&self, subscriber: WebhookSubscriber) {
        self.subscribers.lock().unwrap().push(subscriber);
    }

    fn stats_of(&self, id: Uuid) -> WebhookStats {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .unwrap()
            .stats
            .clone()
    }
}

impl WebhookRepository for InMemoryWebhooks {
    async fn create(&self, _input: CreateWebhook) -> HermodResult<WebhookSubscriber> {
        Err(HermodError::Internal("not used".into()))
    }

    async fn get_by_id(&self, id: Uuid) -> HermodResult<WebhookSubscriber> {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| HermodError::not_found("external_webhook", id.to_string()))
    }

    async fn get_by_name(&self, name: &str) -> HermodResult<WebhookSubscriber> {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| HermodError::not_found("external_webhook", name))
    }

    async fn update(&self, _id: Uuid, _input: UpdateWebhook) -> HermodResult<WebhookSubscriber> {
        Err(HermodError::Internal("not used".into()))
    }

    async fn delete(&self, _id: Uuid) -> HermodResult<()> {
        Err(HermodError::Internal("not used".into()))
    }

    async fn list(&self) -> HermodResult<Vec<WebhookSubscriber>> {
        Ok(self.subscribers.lock().unwrap().clone())
    }

    async fn list_enabled(&self) -> HermodResult<Vec<WebhookSubscriber>> {
        Ok(self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect())
    }

    async fn set_enabled(&self, _id: Uuid, _enabled: bool) -> HermodResult<WebhookSubscriber> {
        Err(HermodError::Internal("not used".into()))
    }

    async fn record_execution(&self, id: Uuid, outcome: ExecutionOutcome) -> HermodResult<()> {
        let mut subscribers = self.subscribers.lock().unwrap();
        let subscriber = subscribers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| HermodError::not_found("external_webhook", id.to_string()))?;

        let stats = &mut subscriber.stats;
        stats.total_executions += 1;
        stats.last_execution_at = Some(Utc::now());
        match outcome.status {
            ExecutionStatus::Success => {
                stats.successful_executions += 1;
                stats.last_execution_status = Some(ExecutionStatus::Success);
                stats.last_execution_error = None;
            }
            ExecutionStatus::Failed => {
                stats.failed_executions += 1;
                stats.last_execution_status = Some(ExecutionStatus::Failed);
                stats.last_execution_error = outcome.error;
            }
        }
        Ok(())
    }
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_seconds: 1,
        use_exponential_backoff: true,
        max_delay_seconds: 300,
        jitter_factor: 0.0,
        non_retryable_status_codes: vec![],
    }
}

fn subscriber(url: String) -> WebhookSubscriber {
    WebhookSubscriber {
        id: Uuid::new_v4(),
        name: format!("sub-{}", Uuid::new_v4()),
        url,
        description: None,
        enabled: true,
        events: vec![],
        headers: HashMap::new(),
        authentication: WebhookAuth::None,
        retry_config: fast_retry(1),
        security_config: SecurityConfig::default(),
        filter_config: FilterConfig::default(),
        timeout_ms: 5000,
        stats: WebhookStats::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn setup() -> (Arc<InMemoryWebhooks>, WebhookDispatcher<InMemoryWebhooks>) {
    let repo = Arc::new(InMemoryWebhooks::default());
    let dispatcher = WebhookDispatcher::new(repo.clone());
    (repo, dispatcher)
}

#[tokio::test]
async fn delivers_envelope_with_event_and_webhook_metadata() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let sub = subscriber(format!("{}/hook", server.uri()));
    let id = sub.id;
    let name = sub.name.clone();
    repo.insert(sub);

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "event": "MESSAGES_UPSERT",
            "instance": "wa-01",
            "data": { "ping": 1 },
            "webhook": { "id": id, "name": name },
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    dispatcher
        .dispatch(
            EventKind::MessagesUpsert,
            json!({ "ping": 1 }),
            Some("wa-01".into()),
        )
        .await;

    let stats = repo.stats_of(id);
    assert_eq!(stats.total_executions, 1);
    assert_eq!(stats.successful_executions, 1);
    assert_eq!(stats.last_execution_status, Some(ExecutionStatus::Success));
}

#[tokio::test]
async fn retries_on_500_until_success() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut sub = subscriber(format!("{}/flaky", server.uri()));
    sub.retry_config = fast_retry(3);
    let id = sub.id;
    repo.insert(sub);

    // Two failures, then success: three requests total.
    Mock::given(method("POST"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;
    let elapsed = started.elapsed();

    // Backoff of ~1s then ~2s between the three attempts.
    assert!(elapsed >= Duration::from_secs(3), "returned after {elapsed:?}");

    let stats = repo.stats_of(id);
    assert_eq!(stats.total_executions, 1);
    assert_eq!(stats.successful_executions, 1);
    assert_eq!(stats.failed_executions, 0);
}

#[tokio::test]
async fn non_retryable_status_issues_exactly_one_request() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut sub = subscriber(format!("{}/gone", server.uri()));
    sub.retry_config = RetryConfig {
        non_retryable_status_codes: vec![404],
        ..fast_retry(5)
    };
    let id = sub.id;
    repo.insert(sub);

    Mock::given(method("POST"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;

    let stats = repo.stats_of(id);
    assert_eq!(stats.total_executions, 1);
    assert_eq!(stats.failed_executions, 1);
    assert!(
        stats
            .last_execution_error
            .as_deref()
            .unwrap()
            .contains("404")
    );
}

#[tokio::test]
async fn retries_are_bounded_by_max_attempts() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut sub = subscriber(format!("{}/down", server.uri()));
    sub.retry_config = fast_retry(2);
    let id = sub.id;
    repo.insert(sub);

    Mock::given(method("POST"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;

    let stats = repo.stats_of(id);
    assert_eq!(stats.total_executions, 1);
    assert_eq!(stats.failed_executions, 1);
}

#[tokio::test]
async fn circuit_opens_after_consecutive_failures_then_probes() {
    let server = MockServer::start().await;
    let repo = Arc::new(InMemoryWebhooks::default());
    // Threshold of 5, short cooldown so the test does not wait a minute.
    let dispatcher = WebhookDispatcher::with_breakers(
        repo.clone(),
        CircuitBreakerSet::with_config(5, Duration::from_millis(200)),
    );

    let sub = subscriber(format!("{}/dead", server.uri()));
    let id = sub.id;
    repo.insert(sub);

    Mock::given(method("POST"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    for _ in 0..5 {
        dispatcher
            .dispatch(EventKind::SendMessage, json!({}), None)
            .await;
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 5);

    // Circuit is open: the sixth dispatch issues no request and records
    // nothing.
    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
    assert_eq!(repo.stats_of(id).total_executions, 5);

    // After the cooldown one probe goes through.
    tokio::time::sleep(Duration::from_millis(250)).await;
    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;
    assert_eq!(server.received_requests().await.unwrap().len(), 6);
}

#[tokio::test]
async fn event_filter_skips_unsubscribed_kinds() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut sub = subscriber(format!("{}/hook", server.uri()));
    sub.events = vec![EventKind::QrcodeUpdated];
    let id = sub.id;
    repo.insert(sub);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;

    assert_eq!(repo.stats_of(id).total_executions, 0);
}

#[tokio::test]
async fn instance_filters_gate_delivery() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut allow_only = subscriber(format!("{}/allow", server.uri()));
    allow_only.filter_config.instances = vec!["wa-01".into()];
    repo.insert(allow_only);

    let mut excluded = subscriber(format!("{}/deny", server.uri()));
    excluded.filter_config.exclude_instances = vec!["wa-02".into()];
    repo.insert(excluded);

    Mock::given(method("POST"))
        .and(path("/allow"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/deny"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // wa-02 is not in the allow-list and is in the deny-list.
    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), Some("wa-02".into()))
        .await;
}

#[tokio::test]
async fn disabled_subscriber_is_skipped() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut sub = subscriber(format!("{}/hook", server.uri()));
    sub.enabled = false;
    repo.insert(sub);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;
}

#[tokio::test]
async fn bearer_auth_and_custom_headers_are_sent() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut sub = subscriber(format!("{}/hook", server.uri()));
    sub.authentication = WebhookAuth::Bearer {
        token: "tok-42".into(),
    };
    sub.headers
        .insert("X-Tenant".to_string(), "acme".to_string());
    repo.insert(sub);

    Mock::given(method("POST"))
        .and(header("authorization", "Bearer tok-42"))
        .and(header("x-tenant", "acme"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;
}

#[tokio::test]
async fn signature_header_is_attached_when_enabled() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut sub = subscriber(format!("{}/hook", server.uri()));
    sub.security_config = SecurityConfig {
        enable_signature_validation: true,
        signature_secret: Some("0123456789abcdef".into()),
        signature_header: "X-Webhook-Signature".into(),
        signature_algorithm: SignatureAlgorithm::Sha256,
    };
    repo.insert(sub);

    Mock::given(method("POST"))
        .and(header_exists("x-webhook-signature"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;

    // The header carries the algorithm prefix and a hex digest.
    let requests = server.received_requests().await.unwrap();
    let value = requests[0]
        .headers
        .get("x-webhook-signature")
        .unwrap()
        .to_str()
        .unwrap();
    let digest = value.strip_prefix("sha256=").unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn slow_subscriber_does_not_block_fast_one() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut slow = subscriber(format!("{}/slow", server.uri()));
    slow.retry_config = fast_retry(1);
    repo.insert(slow);

    let fast = subscriber(format!("{}/fast", server.uri()));
    let fast_id = fast.id;
    repo.insert(fast);

    Mock::given(method("POST"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    dispatcher
        .dispatch(EventKind::SendMessage, json!({}), None)
        .await;

    // Settled-all: the call waits for the slow one, but the total is the
    // max of the two, not the sum.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(800));
    assert!(elapsed < Duration::from_millis(1600), "deliveries ran serially");
    assert_eq!(repo.stats_of(fast_id).successful_executions, 1);
}

#[tokio::test]
async fn dispatch_to_ignores_filters_and_reports_outcome() {
    let server = MockServer::start().await;
    let (repo, dispatcher) = setup();

    let mut sub = subscriber(format!("{}/test", server.uri()));
    // Filters would normally skip this delivery entirely.
    sub.events = vec![EventKind::QrcodeUpdated];
    sub.filter_config.instances = vec!["other".into()];
    let id = sub.id;
    repo.insert(sub);

    Mock::given(method("POST"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let report = dispatcher
        .dispatch_to(id, EventKind::SendMessage, json!({"probe": true}), None)
        .await
        .unwrap();

    assert!(report.delivered);
    assert_eq!(report.attempts, 1);
    assert_eq!(repo.stats_of(id).successful_executions, 1);
}

#[tokio::test]
async fn dispatch_to_unknown_subscriber_is_not_found() {
    let (_, dispatcher) = setup();

    let err = dispatcher
        .dispatch_to(Uuid::new_v4(), EventKind::SendMessage, json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HermodError::NotFound { .. }));
}
