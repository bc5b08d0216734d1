//! Execution statistics recording.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use hermod_core::models::webhook::{ExecutionOutcome, ExecutionStatus};
use hermod_core::repository::WebhookRepository;

/// Records settled delivery outcomes onto the subscriber record.
///
/// Recording failures are logged and swallowed: delivery bookkeeping
/// must never surface errors to the event producer.
pub struct StatsRecorder<R: WebhookRepository> {
    repo: Arc<R>,
}

impl<R: WebhookRepository> Clone for StatsRecorder<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<R: WebhookRepository> StatsRecorder<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn record_success(&self, id: Uuid, duration_ms: u64) {
        let outcome = ExecutionOutcome {
            status: ExecutionStatus::Success,
            error: None,
            duration_ms,
        };
        if let Err(error) = self.repo.record_execution(id, outcome).await {
            warn!(webhook = %id, %error, "failed to record successful execution");
        }
    }

    pub async fn record_failure(&self, id: Uuid, message: String, duration_ms: u64) {
        let outcome = ExecutionOutcome {
            status: ExecutionStatus::Failed,
            error: Some(message),
            duration_ms,
        };
        if let Err(error) = self.repo.record_execution(id, outcome).await {
            warn!(webhook = %id, %error, "failed to record failed execution");
        }
    }
}
