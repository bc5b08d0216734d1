//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations live in
//! `hermod-db`; in-memory fakes are used in tests.

use uuid::Uuid;

use crate::error::HermodResult;
use crate::models::instance_group::{CreateInstanceGroup, InstanceGroup, UpdateInstanceGroup};
use crate::models::webhook::{CreateWebhook, ExecutionOutcome, UpdateWebhook, WebhookSubscriber};

// ---------------------------------------------------------------------------
// Instance groups
// ---------------------------------------------------------------------------

pub trait GroupRepository: Send + Sync {
    /// Create a group. Rejects duplicate `name` or `alias` with a
    /// validation error.
    fn create(
        &self,
        input: CreateInstanceGroup,
    ) -> impl Future<Output = HermodResult<InstanceGroup>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = HermodResult<InstanceGroup>> + Send;
    fn get_by_name(&self, name: &str)
    -> impl Future<Output = HermodResult<InstanceGroup>> + Send;
    fn get_by_alias(
        &self,
        alias: &str,
    ) -> impl Future<Output = HermodResult<InstanceGroup>> + Send;

    /// Update a group. Rejects name/alias collisions with any record
    /// other than self.
    fn update(
        &self,
        id: Uuid,
        input: UpdateInstanceGroup,
    ) -> impl Future<Output = HermodResult<InstanceGroup>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = HermodResult<()>> + Send;
    fn list(&self) -> impl Future<Output = HermodResult<Vec<InstanceGroup>>> + Send;

    /// Append an instance to the membership. Rejects duplicates.
    fn add_instance(
        &self,
        id: Uuid,
        instance: &str,
    ) -> impl Future<Output = HermodResult<InstanceGroup>> + Send;

    /// Remove an instance from the membership. Rejects removals that
    /// would empty the set or name an absent member.
    fn remove_instance(
        &self,
        id: Uuid,
        instance: &str,
    ) -> impl Future<Output = HermodResult<InstanceGroup>> + Send;
}

// ---------------------------------------------------------------------------
// Webhook subscribers
// ---------------------------------------------------------------------------

pub trait WebhookRepository: Send + Sync {
    /// Create a subscriber. Rejects duplicate `name`.
    fn create(
        &self,
        input: CreateWebhook,
    ) -> impl Future<Output = HermodResult<WebhookSubscriber>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = HermodResult<WebhookSubscriber>> + Send;
    fn get_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = HermodResult<WebhookSubscriber>> + Send;

    fn update(
        &self,
        id: Uuid,
        input: UpdateWebhook,
    ) -> impl Future<Output = HermodResult<WebhookSubscriber>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = HermodResult<()>> + Send;
    fn list(&self) -> impl Future<Output = HermodResult<Vec<WebhookSubscriber>>> + Send;

    /// All subscribers with `enabled = true`; the dispatcher's fan-out
    /// source.
    fn list_enabled(&self) -> impl Future<Output = HermodResult<Vec<WebhookSubscriber>>> + Send;

    /// Flip the enabled gate, returning the updated record.
    fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
    ) -> impl Future<Output = HermodResult<WebhookSubscriber>> + Send;

    /// Record one settled delivery into the stats counters.
    ///
    /// Counter increments must be atomic on the storage side so that
    /// concurrent deliveries never lose counts.
    fn record_execution(
        &self,
        id: Uuid,
        outcome: ExecutionOutcome,
    ) -> impl Future<Output = HermodResult<()>> + Send;
}
