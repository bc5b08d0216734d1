//! Rotation state records and cache key builders.
//!
//! Grouped sends use `group_rotation:<groupId>:*` keys; ungrouped sends
//! use `instance_rotation:<contact>` and the top-level `global_rotation`
//! key. The two namespaces never share state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rotation state for one contact within one pool.
///
/// `used_instances` is serialized as a finite list; ordering is not
/// meaningful to consumers.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RotationDescriptor {
    pub used_instances: Vec<String>,
    pub last_used_instance: Option<String>,
    /// Number of completed cycles for this contact.
    pub rotation_count: u64,
}

/// Pool-wide rotation cursor driving round-robin fairness.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GlobalRotation {
    pub last_used_instance: Option<String>,
    pub rotation_count: u64,
}

/// Strip everything but ASCII digits from a contact identifier.
pub fn normalize_contact(contact: &str) -> String {
    contact.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Key for a contact's descriptor within a group.
pub fn group_contact_key(group_id: Uuid, contact: &str) -> String {
    format!("group_rotation:{group_id}:{}", normalize_contact(contact))
}

/// Key for a group's global rotation cursor.
pub fn group_global_key(group_id: Uuid) -> String {
    format!("group_rotation:{group_id}:global")
}

/// Key for a contact's descriptor on the ungrouped path.
pub fn instance_contact_key(contact: &str) -> String {
    format!("instance_rotation:{}", normalize_contact(contact))
}

/// Top-level global rotation cursor for the ungrouped path.
pub const GLOBAL_ROTATION_KEY: &str = "global_rotation";
