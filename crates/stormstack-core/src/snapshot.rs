//! ECS world snapshot types for serialization and streaming.
//!
//! Snapshots represent the state of the ECS world at a point in time.
//! Deltas represent changes between snapshots for efficient streaming.
//!
//! Component values carry their presence explicitly: a component is either
//! bound (`Some(ComponentValue)`) or entirely absent from the map. There is
//! no in-band sentinel (such as `NaN`) standing in for "no value" — a
//! genuine `NaN` float is a legitimate bound value and round-trips exactly
//! like any other.

use crate::id::{ComponentTypeId, EntityId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bound component value.
///
/// Primary representation is a 32-bit float; modules that need to carry an
/// opaque handle (an index into module-private state, a resource id, …)
/// use the 64-bit integer form instead. There is no third "empty" variant:
/// absence is represented by the component simply not appearing in an
/// entity's component map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ComponentValue {
    /// Scalar float value (the common case: positions, velocities, health).
    Float(f32),
    /// Opaque 64-bit integer handle.
    Handle(i64),
}

impl ComponentValue {
    /// The float value, if this is a [`ComponentValue::Float`].
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            ComponentValue::Float(v) => Some(*v),
            ComponentValue::Handle(_) => None,
        }
    }

    /// The handle value, if this is a [`ComponentValue::Handle`].
    #[must_use]
    pub fn as_handle(&self) -> Option<i64> {
        match self {
            ComponentValue::Handle(v) => Some(*v),
            ComponentValue::Float(_) => None,
        }
    }
}

/// Full world state snapshot for initial sync.
///
/// Sent to clients when they first subscribe to a match,
/// or periodically to resync state. `entities` is always sorted by
/// `EntityId` so two snapshots of the same logical state compare
/// byte-equal regardless of the store's internal iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Current game tick number.
    pub tick: u64,

    /// Timestamp when snapshot was taken (Unix millis).
    pub timestamp: i64,

    /// All entities and their components, sorted by `EntityId`.
    pub entities: Vec<EntitySnapshot>,
}

impl WorldSnapshot {
    /// Create a new empty snapshot.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            timestamp: chrono::Utc::now().timestamp_millis(),
            entities: Vec::new(),
        }
    }

    /// Create a snapshot with a caller-supplied timestamp, useful for tests
    /// that need byte-equal comparisons across two independently built
    /// snapshots of the same tick.
    #[must_use]
    pub fn with_timestamp(tick: u64, timestamp: i64, entities: Vec<EntitySnapshot>) -> Self {
        Self {
            tick,
            timestamp,
            entities,
        }
    }

    /// Get the number of entities in this snapshot.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Scope this snapshot to the entities visible to `filter`. `None`
    /// returns an unfiltered clone.
    #[must_use]
    pub fn filtered_for_player(&self, filter: Option<PlayerId>) -> WorldSnapshot {
        let Some(handle) = filter.map(|p| p.owner_handle()) else {
            return self.clone();
        };
        WorldSnapshot {
            tick: self.tick,
            timestamp: self.timestamp,
            entities: self
                .entities
                .iter()
                .filter(|e| e.visible_to(Some(handle)))
                .cloned()
                .collect(),
        }
    }

    /// Apply a delta produced from this snapshot's tick, returning the
    /// resulting snapshot at `delta.to_tick`.
    ///
    /// # Errors
    ///
    /// Returns an error (as a plain string reason) if `delta.from_tick`
    /// does not match this snapshot's tick.
    pub fn apply_delta(&self, delta: &WorldDelta) -> Result<WorldSnapshot, String> {
        if delta.from_tick != self.tick {
            return Err(format!(
                "delta from_tick {} does not match snapshot tick {}",
                delta.from_tick, self.tick
            ));
        }

        let mut by_id: BTreeMap<EntityId, EntitySnapshot> = self
            .entities
            .iter()
            .cloned()
            .map(|e| (e.id, e))
            .collect();

        for despawned in &delta.despawned {
            by_id.remove(despawned);
        }

        for spawned in &delta.spawned {
            by_id.insert(spawned.id, spawned.clone());
        }

        for update in &delta.updated {
            let entry = by_id
                .entry(update.entity)
                .or_insert_with(|| EntitySnapshot::new(update.entity));
            match &update.value {
                Some(value) => {
                    entry.components.insert(update.component_type, *value);
                }
                None => {
                    entry.components.remove(&update.component_type);
                }
            }
        }

        Ok(WorldSnapshot {
            tick: delta.to_tick,
            timestamp: self.timestamp,
            entities: by_id.into_values().collect(),
        })
    }
}

/// Single entity snapshot with all its components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity identifier.
    pub id: EntityId,

    /// Map of component type to value. Ordered by `ComponentTypeId` so
    /// serialization is deterministic.
    pub components: BTreeMap<ComponentTypeId, ComponentValue>,
}

impl EntitySnapshot {
    /// Create a new entity snapshot with no components bound.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            components: BTreeMap::new(),
        }
    }

    /// Bind a component on this snapshot.
    pub fn set_component(&mut self, type_id: ComponentTypeId, value: ComponentValue) {
        self.components.insert(type_id, value);
    }

    /// Get the number of components bound on this entity.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// The owning player's handle, if this entity has an `OWNER` component
    /// bound to a [`ComponentValue::Handle`].
    #[must_use]
    pub fn owner(&self) -> Option<i64> {
        match self.components.get(&ComponentTypeId::OWNER) {
            Some(ComponentValue::Handle(v)) => Some(*v),
            _ => None,
        }
    }

    /// Whether this entity should be included in a stream scoped to
    /// `filter`. Unowned entities are visible to every filter; owned
    /// entities only to their owner. `None` (no filter) sees everything.
    #[must_use]
    pub fn visible_to(&self, filter: Option<i64>) -> bool {
        match (self.owner(), filter) {
            (Some(owner), Some(handle)) => owner == handle,
            _ => true,
        }
    }
}

/// Delta update for incremental sync.
///
/// Contains only changes since the last snapshot/delta,
/// reducing bandwidth for real-time streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldDelta {
    /// Starting tick (exclusive).
    pub from_tick: u64,

    /// Ending tick (inclusive).
    pub to_tick: u64,

    /// Newly spawned entities with initial state.
    pub spawned: Vec<EntitySnapshot>,

    /// IDs of despawned entities.
    pub despawned: Vec<EntityId>,

    /// Component updates for existing entities.
    pub updated: Vec<ComponentUpdate>,
}

impl WorldDelta {
    /// Create a new empty delta.
    #[must_use]
    pub fn new(from_tick: u64, to_tick: u64) -> Self {
        Self {
            from_tick,
            to_tick,
            spawned: Vec::new(),
            despawned: Vec::new(),
            updated: Vec::new(),
        }
    }

    /// Check if this delta is empty (no changes).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.despawned.is_empty() && self.updated.is_empty()
    }

    /// Get the total number of changes in this delta.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.spawned.len() + self.despawned.len() + self.updated.len()
    }

    /// Scope this delta to the entities visible to `filter`.
    ///
    /// Spawns carry their full component set and are filtered directly via
    /// [`EntitySnapshot::visible_to`]. Despawns and per-component updates
    /// don't: a despawn or an update to an unrelated component may not
    /// mention the `OWNER` component at all, so `current_owner` is asked
    /// for the entity's live ownership instead. `None` returns an
    /// unfiltered clone.
    #[must_use]
    pub fn filtered_for_player(
        &self,
        filter: Option<PlayerId>,
        current_owner: impl Fn(EntityId) -> Option<i64>,
    ) -> WorldDelta {
        let Some(handle) = filter.map(|p| p.owner_handle()) else {
            return self.clone();
        };
        let visible = |entity: EntityId| match current_owner(entity) {
            Some(owner) => owner == handle,
            None => true,
        };
        WorldDelta {
            from_tick: self.from_tick,
            to_tick: self.to_tick,
            spawned: self
                .spawned
                .iter()
                .filter(|e| e.visible_to(Some(handle)))
                .cloned()
                .collect(),
            despawned: self.despawned.iter().copied().filter(|&e| visible(e)).collect(),
            updated: self
                .updated
                .iter()
                .filter(|u| visible(u.entity))
                .cloned()
                .collect(),
        }
    }
}

/// Single component update for an existing entity.
///
/// `value: None` represents a detach (tombstone): the component is removed
/// from the entity when this update is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentUpdate {
    /// Entity being updated.
    pub entity: EntityId,

    /// Type of component being updated.
    pub component_type: ComponentTypeId,

    /// New value, or `None` for a detach tombstone.
    pub value: Option<ComponentValue>,
}

impl ComponentUpdate {
    /// Create a new component set (attach/overwrite) update.
    #[must_use]
    pub fn set(entity: EntityId, component_type: ComponentTypeId, value: ComponentValue) -> Self {
        Self {
            entity,
            component_type,
            value: Some(value),
        }
    }

    /// Create a new component detach (tombstone) update.
    #[must_use]
    pub fn tombstone(entity: EntityId, component_type: ComponentTypeId) -> Self {
        Self {
            entity,
            component_type,
            value: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_snapshot_new() {
        let snapshot = WorldSnapshot::new(100);
        assert_eq!(snapshot.tick, 100);
        assert!(snapshot.entities.is_empty());
        assert!(snapshot.timestamp > 0);
    }

    #[test]
    fn entity_snapshot_set_component() {
        let mut entity = EntitySnapshot::new(EntityId(1));
        entity.set_component(ComponentTypeId(1), ComponentValue::Float(1.5));
        entity.set_component(ComponentTypeId(2), ComponentValue::Handle(42));

        assert_eq!(entity.component_count(), 2);
        assert_eq!(
            entity.components.get(&ComponentTypeId(1)),
            Some(&ComponentValue::Float(1.5))
        );
    }

    #[test]
    fn component_value_accessors() {
        let f = ComponentValue::Float(2.0);
        assert_eq!(f.as_float(), Some(2.0));
        assert_eq!(f.as_handle(), None);

        let h = ComponentValue::Handle(7);
        assert_eq!(h.as_handle(), Some(7));
        assert_eq!(h.as_float(), None);
    }

    #[test]
    fn nan_is_a_real_value_not_absence() {
        let entity = {
            let mut e = EntitySnapshot::new(EntityId(1));
            e.set_component(ComponentTypeId(1), ComponentValue::Float(f32::NAN));
            e
        };
        // The component is present even though its value is NaN.
        assert_eq!(entity.component_count(), 1);
        assert!(entity.components.contains_key(&ComponentTypeId(1)));
    }

    #[test]
    fn world_delta_empty() {
        let delta = WorldDelta::new(0, 1);
        assert!(delta.is_empty());
        assert_eq!(delta.change_count(), 0);
    }

    #[test]
    fn world_delta_with_changes() {
        let mut delta = WorldDelta::new(0, 5);
        delta.spawned.push(EntitySnapshot::new(EntityId(1)));
        delta.despawned.push(EntityId(2));
        delta.updated.push(ComponentUpdate::set(
            EntityId(3),
            ComponentTypeId(1),
            ComponentValue::Float(1.0),
        ));

        assert!(!delta.is_empty());
        assert_eq!(delta.change_count(), 3);
    }

    #[test]
    fn snapshot_serialization_roundtrip() {
        let mut snapshot = WorldSnapshot::new(42);
        let mut entity = EntitySnapshot::new(EntityId(1));
        entity.set_component(ComponentTypeId(100), ComponentValue::Float(3.25));
        snapshot.entities.push(entity);

        let json = serde_json::to_string(&snapshot).expect("serialize");
        let parsed: WorldSnapshot = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed.tick, 42);
        assert_eq!(parsed.entities.len(), 1);
        assert_eq!(parsed.entities[0].id, EntityId(1));
    }

    fn entity_with(id: u64, components: &[(u64, ComponentValue)]) -> EntitySnapshot {
        let mut e = EntitySnapshot::new(EntityId(id));
        for (ty, value) in components {
            e.set_component(ComponentTypeId(*ty), *value);
        }
        e
    }

    #[test]
    fn delta_round_trip_law() {
        // S0: three entities, two components each.
        let s0 = WorldSnapshot::with_timestamp(
            0,
            1000,
            vec![
                entity_with(1, &[(1, ComponentValue::Float(1.0)), (2, ComponentValue::Float(2.0))]),
                entity_with(2, &[(1, ComponentValue::Float(3.0)), (2, ComponentValue::Float(4.0))]),
                entity_with(3, &[(1, ComponentValue::Float(5.0)), (2, ComponentValue::Float(6.0))]),
            ],
        );

        // Spawn a 4th, delete the 1st, modify one component on the 2nd.
        let mut delta = WorldDelta::new(0, 1);
        delta
            .spawned
            .push(entity_with(4, &[(1, ComponentValue::Float(9.0))]));
        delta.despawned.push(EntityId(1));
        delta
            .updated
            .push(ComponentUpdate::set(EntityId(2), ComponentTypeId(1), ComponentValue::Float(99.0)));

        let s1_applied = s0.apply_delta(&delta).expect("apply");

        let s1_fresh = WorldSnapshot::with_timestamp(
            1,
            1000,
            vec![
                entity_with(2, &[(1, ComponentValue::Float(99.0)), (2, ComponentValue::Float(4.0))]),
                entity_with(3, &[(1, ComponentValue::Float(5.0)), (2, ComponentValue::Float(6.0))]),
                entity_with(4, &[(1, ComponentValue::Float(9.0))]),
            ],
        );

        let applied_json = serde_json::to_string(&s1_applied).expect("serialize applied");
        let fresh_json = serde_json::to_string(&s1_fresh).expect("serialize fresh");
        assert_eq!(applied_json, fresh_json);
    }

    #[test]
    fn delta_apply_rejects_mismatched_from_tick() {
        let s0 = WorldSnapshot::new(5);
        let delta = WorldDelta::new(4, 5);
        assert!(s0.apply_delta(&delta).is_err());
    }

    #[test]
    fn delta_tombstone_removes_component_on_apply() {
        let s0 = WorldSnapshot::with_timestamp(
            0,
            0,
            vec![entity_with(1, &[(1, ComponentValue::Float(1.0))])],
        );
        let mut delta = WorldDelta::new(0, 1);
        delta.updated.push(ComponentUpdate::tombstone(EntityId(1), ComponentTypeId(1)));

        let s1 = s0.apply_delta(&delta).expect("apply");
        assert_eq!(s1.entities[0].component_count(), 0);
    }

    #[test]
    fn empty_delta_across_zero_ticks_is_empty() {
        let delta = WorldDelta::new(10, 10);
        assert!(delta.is_empty());
    }

    #[test]
    fn unowned_entity_is_visible_to_every_filter() {
        let e = EntitySnapshot::new(EntityId(1));
        assert!(e.visible_to(None));
        assert!(e.visible_to(Some(7)));
    }

    #[test]
    fn owned_entity_only_visible_to_its_owner() {
        let mut e = EntitySnapshot::new(EntityId(1));
        e.set_component(ComponentTypeId::OWNER, ComponentValue::Handle(7));
        assert!(e.visible_to(None));
        assert!(e.visible_to(Some(7)));
        assert!(!e.visible_to(Some(8)));
    }

    #[test]
    fn filtered_snapshot_drops_entities_owned_by_other_players() {
        let alice = PlayerId::new();
        let bob = PlayerId::new();

        let mut owned_by_alice = EntitySnapshot::new(EntityId(1));
        owned_by_alice.set_component(ComponentTypeId::OWNER, ComponentValue::Handle(alice.owner_handle()));
        let shared = EntitySnapshot::new(EntityId(2));

        let snapshot =
            WorldSnapshot::with_timestamp(0, 0, vec![owned_by_alice.clone(), shared.clone()]);

        let for_alice = snapshot.filtered_for_player(Some(alice));
        assert_eq!(for_alice.entities.len(), 2);

        let for_bob = snapshot.filtered_for_player(Some(bob));
        assert_eq!(for_bob.entities, vec![shared]);

        let unfiltered = snapshot.filtered_for_player(None);
        assert_eq!(unfiltered.entities.len(), 2);
    }

    #[test]
    fn filtered_delta_drops_spawns_and_updates_owned_by_other_players() {
        let alice = PlayerId::new();
        let bob = PlayerId::new();

        let mut spawn = EntitySnapshot::new(EntityId(1));
        spawn.set_component(ComponentTypeId::OWNER, ComponentValue::Handle(bob.owner_handle()));

        let mut delta = WorldDelta::new(0, 1);
        delta.spawned.push(spawn);
        delta.despawned.push(EntityId(2));
        delta
            .updated
            .push(ComponentUpdate::set(EntityId(3), ComponentTypeId(1), ComponentValue::Float(1.0)));

        // Entity 2 is owned by bob, entity 3 is shared (no current owner).
        let current_owner = |e: EntityId| match e {
            EntityId(2) => Some(bob.owner_handle()),
            _ => None,
        };

        let for_alice = delta.filtered_for_player(Some(alice), current_owner);
        assert!(for_alice.spawned.is_empty());
        assert!(for_alice.despawned.is_empty());
        assert_eq!(for_alice.updated.len(), 1);

        let for_bob = delta.filtered_for_player(Some(bob), current_owner);
        assert_eq!(for_bob.spawned.len(), 1);
        assert_eq!(for_bob.despawned.len(), 1);
        assert_eq!(for_bob.updated.len(), 1);

        let unfiltered = delta.filtered_for_player(None, current_owner);
        assert_eq!(unfiltered.change_count(), delta.change_count());
    }
}
