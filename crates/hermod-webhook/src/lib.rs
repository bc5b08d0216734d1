//! Hermod Webhook — event fan-out to external HTTP subscribers.
//!
//! This crate provides:
//! - The [`WebhookDispatcher`]: filtered, authenticated, retried,
//!   circuit-broken HTTP POST deliveries
//! - The per-subscriber [`CircuitBreakerSet`]
//! - Auth-header construction and HMAC payload signatures
//! - Stats recording over the repository contract

mod auth;
mod breaker;
mod dispatcher;
mod signature;
mod stats;

pub use auth::build_auth_headers;
pub use breaker::{CircuitBreakerSet, CircuitState, GateDecision};
pub use dispatcher::{DeliveryReport, WebhookDispatcher};
pub use signature::sign_payload;
pub use stats::StatsRecorder;
