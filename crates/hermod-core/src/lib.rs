//! Hermod Core — domain models, repository traits and error taxonomy.
//!
//! This crate defines:
//! - Domain models (instance groups, webhook subscribers, rotation state)
//! - Repository traits implemented by `hermod-db`
//! - Collaborator contracts ([`InstanceRegistry`], [`TextSender`])
//! - The surface error taxonomy ([`HermodError`])

pub mod error;
pub mod events;
pub mod models;
pub mod registry;
pub mod repository;
pub mod sender;

pub use error::{HermodError, HermodResult};
pub use events::EventKind;
pub use registry::{ConnectionState, InMemoryInstanceRegistry, InstanceRegistry};
pub use sender::TextSender;
