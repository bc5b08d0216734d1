//! Contact-affinity-aware round-robin balancer.
//!
//! Two invariants hold simultaneously: a contact never lands on the
//! same instance twice in a row (while more than one is available), and
//! picks across contacts advance a shared round-robin cursor for fair
//! load distribution.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use hermod_core::error::{HermodError, HermodResult};
use hermod_core::models::rotation::{
    GLOBAL_ROTATION_KEY, GlobalRotation, RotationDescriptor, group_contact_key, group_global_key,
    instance_contact_key, normalize_contact,
};
use hermod_core::registry::{ConnectionState, InstanceRegistry};
use hermod_core::repository::GroupRepository;

use crate::cache::SharedCache;
use crate::store::{ROTATION_TTL, RotationStore};

/// Result of one balancing decision, including the rotation snapshot
/// reported back to API callers.
#[derive(Debug, Clone)]
pub struct Selection {
    pub instance: String,
    /// Normalized contact the decision was keyed on.
    pub contact: String,
    pub group_id: Option<Uuid>,
    pub used_instances_in_cycle: Vec<String>,
    pub rotation_count: u64,
    pub global_last_used_instance: Option<String>,
    pub global_rotation_count: u64,
}

pub struct Balancer<C, R, G>
where
    C: SharedCache,
    R: InstanceRegistry,
    G: GroupRepository,
{
    store: Arc<RotationStore<C>>,
    registry: Arc<R>,
    groups: Arc<G>,
    /// Per-contact-key locks serializing read-modify-write cycles so
    /// concurrent calls for the same contact cannot double-pick.
    contact_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<C, R, G> Balancer<C, R, G>
where
    C: SharedCache,
    R: InstanceRegistry,
    G: GroupRepository,
{
    pub fn new(store: Arc<RotationStore<C>>, registry: Arc<R>, groups: Arc<G>) -> Self {
        Self {
            store,
            registry,
            groups,
            contact_locks: DashMap::new(),
        }
    }

    /// Select an instance for `contact` within the group named by
    /// `alias`, and advance the group's rotation state.
    pub async fn select_for_contact_in_group(
        &self,
        alias: &str,
        contact: &str,
    ) -> HermodResult<Selection> {
        let group = self.groups.get_by_alias(alias).await?;
        if !group.enabled {
            return Err(HermodError::conflict(format!(
                "instance group '{alias}' is disabled"
            )));
        }

        let candidates = self.open_candidates(&group.instances);
        if candidates.is_empty() {
            return Err(HermodError::conflict(format!(
                "No active instances available in group '{alias}'"
            )));
        }

        self.select_with_keys(
            candidates,
            group_contact_key(group.id, contact),
            group_global_key(group.id),
            Some(group.id),
            normalize_contact(contact),
        )
        .await
    }

    /// Ungrouped selection over an explicit pool, keyed on the
    /// top-level rotation namespace.
    pub async fn select_for_contact(
        &self,
        contact: &str,
        available_instances: &[String],
    ) -> HermodResult<Selection> {
        let candidates = self.open_candidates(available_instances);
        if candidates.is_empty() {
            return Err(HermodError::conflict(
                "No active instances available".to_string(),
            ));
        }

        self.select_with_keys(
            candidates,
            instance_contact_key(contact),
            GLOBAL_ROTATION_KEY.to_string(),
            None,
            normalize_contact(contact),
        )
        .await
    }

    /// Members currently reporting `open`, in deterministic
    /// lexicographic order.
    fn open_candidates(&self, members: &[String]) -> Vec<String> {
        let mut candidates: Vec<String> = members
            .iter()
            .filter(|name| self.registry.connection_state(name) == ConnectionState::Open)
            .cloned()
            .collect();
        candidates.sort();
        candidates
    }

    async fn select_with_keys(
        &self,
        candidates: Vec<String>,
        contact_key: String,
        global_key: String,
        group_id: Option<Uuid>,
        contact: String,
    ) -> HermodResult<Selection> {
        let lock = self
            .contact_locks
            .entry(contact_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut contact_state: RotationDescriptor =
            self.store.get(&contact_key).await.unwrap_or_default();
        let mut global: GlobalRotation = self.store.get(&global_key).await.unwrap_or_default();

        let start = next_round_robin_index(&candidates, &global);
        let pick = choose(&candidates, &contact_state, start);

        if !contact_state.used_instances.contains(&pick) {
            contact_state.used_instances.push(pick.clone());
        }
        contact_state.last_used_instance = Some(pick.clone());
        if contact_state.used_instances.len() >= candidates.len() {
            // Cycle complete: begin the next one seeded with this pick
            // so "no immediate repeat" still holds across the boundary.
            contact_state.used_instances = vec![pick.clone()];
            contact_state.rotation_count += 1;
        }

        global.last_used_instance = Some(pick.clone());
        global.rotation_count += 1;

        self.store
            .set(&contact_key, &contact_state, ROTATION_TTL)
            .await;
        self.store.set(&global_key, &global, ROTATION_TTL).await;

        Ok(Selection {
            instance: pick,
            contact,
            group_id,
            used_instances_in_cycle: contact_state.used_instances,
            rotation_count: contact_state.rotation_count,
            global_last_used_instance: global.last_used_instance,
            global_rotation_count: global.rotation_count,
        })
    }
}

/// Position after the globally last-used instance, or the head when the
/// cursor is unset or points at an instance no longer in the pool.
fn next_round_robin_index(candidates: &[String], global: &GlobalRotation) -> usize {
    match global
        .last_used_instance
        .as_deref()
        .and_then(|last| candidates.iter().position(|c| c == last))
    {
        Some(position) => (position + 1) % candidates.len(),
        None => 0,
    }
}

/// Scan from `start`, preferring instances the contact has not used
/// this cycle, then anything but the immediately previous pick, then
/// the round-robin slot itself.
fn choose(candidates: &[String], contact: &RotationDescriptor, start: usize) -> String {
    let len = candidates.len();
    let last_used = contact.last_used_instance.as_deref();

    for offset in 0..len {
        let candidate = &candidates[(start + offset) % len];
        if Some(candidate.as_str()) != last_used
            && !contact.used_instances.iter().any(|used| used == candidate)
        {
            return candidate.clone();
        }
    }

    for offset in 0..len {
        let candidate = &candidates[(start + offset) % len];
        if Some(candidate.as_str()) != last_used {
            return candidate.clone();
        }
    }

    candidates[start].clone()
}

#[cfg(test)]
mod tests {
    use hermod_core::models::rotation::{GlobalRotation, RotationDescriptor};

    use super::{choose, next_round_robin_index};

    fn pool(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cursor_starts_at_head() {
        let candidates = pool(&["a", "b", "c"]);
        assert_eq!(
            next_round_robin_index(&candidates, &GlobalRotation::default()),
            0
        );
    }

    #[test]
    fn cursor_advances_past_last_used() {
        let candidates = pool(&["a", "b", "c"]);
        let global = GlobalRotation {
            last_used_instance: Some("b".into()),
            rotation_count: 7,
        };
        assert_eq!(next_round_robin_index(&candidates, &global), 2);
    }

    #[test]
    fn cursor_wraps() {
        let candidates = pool(&["a", "b", "c"]);
        let global = GlobalRotation {
            last_used_instance: Some("c".into()),
            rotation_count: 1,
        };
        assert_eq!(next_round_robin_index(&candidates, &global), 0);
    }

    #[test]
    fn removed_cursor_instance_is_ignored() {
        let candidates = pool(&["a", "c"]);
        let global = GlobalRotation {
            last_used_instance: Some("b".into()),
            rotation_count: 3,
        };
        assert_eq!(next_round_robin_index(&candidates, &global), 0);
    }

    #[test]
    fn choose_prefers_unused() {
        let candidates = pool(&["a", "b", "c"]);
        let contact = RotationDescriptor {
            used_instances: vec!["a".into()],
            last_used_instance: Some("a".into()),
            rotation_count: 0,
        };
        assert_eq!(choose(&candidates, &contact, 0), "b");
    }

    #[test]
    fn choose_falls_back_to_non_repeat() {
        let candidates = pool(&["a", "b"]);
        // Everything used this cycle; only the immediate-repeat rule
        // remains.
        let contact = RotationDescriptor {
            used_instances: vec!["a".into(), "b".into()],
            last_used_instance: Some("b".into()),
            rotation_count: 0,
        };
        assert_eq!(choose(&candidates, &contact, 1), "a");
    }

    #[test]
    fn choose_last_resort_is_round_robin_slot() {
        let candidates = pool(&["solo"]);
        let contact = RotationDescriptor {
            used_instances: vec!["solo".into()],
            last_used_instance: Some("solo".into()),
            rotation_count: 4,
        };
        assert_eq!(choose(&candidates, &contact, 0), "solo");
    }
}
