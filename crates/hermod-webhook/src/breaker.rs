//! Per-subscriber circuit breakers.
//!
//! State lives in process memory only; losing it on restart merely
//! disables an optimization.
//!
//! Transitions:
//!
//! ```text
//! Closed --[failures >= threshold]--> Open
//! Open --[cooldown elapsed at gate check]--> HalfOpen (one probe)
//! HalfOpen --[success]--> Closed
//! HalfOpen --[failure]--> Open
//! ```

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

/// Consecutive failures before a breaker opens.
pub const FAILURE_THRESHOLD: u32 = 5;

/// How long an open breaker rejects deliveries before allowing a probe.
pub const COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny,
}

#[derive(Debug)]
struct BreakerEntry {
    failures: u32,
    last_failure: Option<Instant>,
    state: CircuitState,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            failures: 0,
            last_failure: None,
            state: CircuitState::Closed,
        }
    }
}

/// Shared map of per-subscriber breakers.
#[derive(Debug)]
pub struct CircuitBreakerSet {
    entries: DashMap<Uuid, BreakerEntry>,
    threshold: u32,
    cooldown: Duration,
}

impl Default for CircuitBreakerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerSet {
    pub fn new() -> Self {
        Self::with_config(FAILURE_THRESHOLD, COOLDOWN)
    }

    /// Custom threshold/cooldown, used by tests to avoid real waits.
    pub fn with_config(threshold: u32, cooldown: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            threshold,
            cooldown,
        }
    }

    /// Gate check before a delivery. An open breaker whose cooldown has
    /// elapsed transitions to half-open and admits one probe.
    pub fn check_gate(&self, id: Uuid) -> GateDecision {
        let mut entry = self.entries.entry(id).or_default();
        match entry.state {
            CircuitState::Closed | CircuitState::HalfOpen => GateDecision::Allow,
            CircuitState::Open => {
                let elapsed = entry
                    .last_failure
                    .map(|at| at.elapsed() > self.cooldown)
                    .unwrap_or(true);
                if elapsed {
                    entry.state = CircuitState::HalfOpen;
                    GateDecision::Allow
                } else {
                    GateDecision::Deny
                }
            }
        }
    }

    /// A success while closed is a no-op; a half-open probe success
    /// closes the breaker and clears the failure streak.
    pub fn record_success(&self, id: Uuid) {
        let mut entry = self.entries.entry(id).or_default();
        if entry.state == CircuitState::HalfOpen {
            entry.state = CircuitState::Closed;
            entry.failures = 0;
        }
    }

    pub fn record_failure(&self, id: Uuid) {
        let mut entry = self.entries.entry(id).or_default();
        entry.last_failure = Some(Instant::now());
        match entry.state {
            CircuitState::Closed => {
                entry.failures += 1;
                if entry.failures >= self.threshold {
                    entry.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self, id: Uuid) -> CircuitState {
        self.entries
            .get(&id)
            .map(|entry| entry.state)
            .unwrap_or(CircuitState::Closed)
    }
}
