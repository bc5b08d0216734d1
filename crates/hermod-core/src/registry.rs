//! Read-only view over backend instance connection state.
//!
//! The registry is maintained by the monitoring collaborator; the
//! balancer only ever asks "is this instance usable right now".

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Connection state reported for a backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Connected and usable.
    Open,
    Connecting,
    Closed,
}

pub trait InstanceRegistry: Send + Sync {
    /// Current state of the named instance; `Closed` for unknown names.
    fn connection_state(&self, name: &str) -> ConnectionState;

    /// Whether the instance exists in the registry's backing store,
    /// regardless of its current state.
    fn is_known(&self, name: &str) -> bool;
}

/// Process-local registry fed by connection-update events.
#[derive(Debug, Default)]
pub struct InMemoryInstanceRegistry {
    states: DashMap<String, ConnectionState>,
}

impl InMemoryInstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a state transition for an instance, creating it if new.
    pub fn set_state(&self, name: impl Into<String>, state: ConnectionState) {
        self.states.insert(name.into(), state);
    }

    /// Drop an instance entirely (e.g. on INSTANCE_DELETE).
    pub fn remove(&self, name: &str) {
        self.states.remove(name);
    }
}

impl InstanceRegistry for InMemoryInstanceRegistry {
    fn connection_state(&self, name: &str) -> ConnectionState {
        self.states
            .get(name)
            .map(|entry| *entry.value())
            .unwrap_or(ConnectionState::Closed)
    }

    fn is_known(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }
}
