//! Shared application state.

use std::sync::Arc;

use surrealdb::Connection;

use hermod_core::registry::InMemoryInstanceRegistry;
use hermod_core::sender::TextSender;
use hermod_db::{SurrealGroupRepository, SurrealWebhookRepository};
use hermod_routing::{Balancer, CacheBackend, RotationStore};
use hermod_webhook::WebhookDispatcher;

use crate::config::ServerConfig;

/// Shared state accessible from axum handlers.
///
/// Generic over the database connection (remote in production,
/// in-memory in tests) and the send capability.
pub struct AppState<C: Connection, S: TextSender> {
    pub config: Arc<ServerConfig>,
    pub groups: Arc<SurrealGroupRepository<C>>,
    pub webhooks: Arc<SurrealWebhookRepository<C>>,
    pub registry: Arc<InMemoryInstanceRegistry>,
    pub balancer: Arc<Balancer<CacheBackend, InMemoryInstanceRegistry, SurrealGroupRepository<C>>>,
    pub dispatcher: WebhookDispatcher<SurrealWebhookRepository<C>>,
    pub sender: Arc<S>,
}

impl<C: Connection, S: TextSender> Clone for AppState<C, S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            groups: self.groups.clone(),
            webhooks: self.webhooks.clone(),
            registry: self.registry.clone(),
            balancer: self.balancer.clone(),
            dispatcher: self.dispatcher.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<C: Connection, S: TextSender> AppState<C, S> {
    /// Wire repositories, balancer and dispatcher over one database
    /// client and cache backend.
    pub fn new(
        config: ServerConfig,
        db: surrealdb::Surreal<C>,
        cache: CacheBackend,
        sender: S,
    ) -> Self {
        let groups = Arc::new(SurrealGroupRepository::new(db.clone()));
        let webhooks = Arc::new(SurrealWebhookRepository::new(db));
        let registry = Arc::new(InMemoryInstanceRegistry::new());
        let store = Arc::new(RotationStore::new(cache));
        let balancer = Arc::new(Balancer::new(store, registry.clone(), groups.clone()));
        let dispatcher = WebhookDispatcher::new(webhooks.clone());

        Self {
            config: Arc::new(config),
            groups,
            webhooks,
            registry,
            balancer,
            dispatcher,
            sender: Arc::new(sender),
        }
    }
}
