//! Columnar component storage for a single match.
//!
//! One [`ComponentStore`] holds every entity and component binding for
//! exactly one match. It is never shared across matches: the implicit
//! `MATCH_ID` binding named in the data model is therefore not materialized
//! as a column — which store an entity lives in already encodes it.

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use stormstack_core::{
    ComponentTypeId, ComponentUpdate, ComponentValue, EntityId, EntitySnapshot, Result,
    StormError, WorldDelta, WorldSnapshot,
};
use tracing::{debug, trace, warn};

/// Shared, container-scoped entity id allocator.
///
/// A `Container` owns one of these and hands a clone to every
/// [`ComponentStore`] it creates, so `EntityId` values never collide across
/// the matches of one container, even though each store's data is otherwise
/// fully isolated.
#[derive(Clone, Default)]
pub struct EntityIdAllocator(Arc<AtomicU64>);

impl EntityIdAllocator {
    /// Create a fresh allocator starting at entity id 1 (0 is never issued).
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }

    fn next(&self) -> EntityId {
        EntityId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// The set of changes accumulated during one open tick, not yet closed by
/// [`ComponentStore::advance_version`].
#[derive(Debug, Default)]
struct ChangeSet {
    spawned: Vec<EntityId>,
    despawned: Vec<EntityId>,
    updated: Vec<ComponentUpdate>,
}

impl ChangeSet {
    fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.despawned.is_empty() && self.updated.is_empty()
    }
}

/// Column-oriented entity-component store for one match.
///
/// Rows are entities, columns are component types; each column is a map
/// from `EntityId` to its bound [`ComponentValue`] (absence of a key *is*
/// absence of the component — there is no sentinel value standing in for
/// "unset").
pub struct ComponentStore {
    entity_alloc: EntityIdAllocator,
    capacity: Option<usize>,
    known_components: HashSet<ComponentTypeId>,
    live_entities: BTreeSet<EntityId>,
    retired_entities: HashSet<EntityId>,
    columns: HashMap<ComponentTypeId, HashMap<EntityId, ComponentValue>>,
    current_version: u64,
    pending: ChangeSet,
    change_log: BTreeMap<u64, ChangeSet>,
}

impl ComponentStore {
    /// Create a new, empty store sharing `entity_alloc` with its owning
    /// container.
    #[must_use]
    pub fn new(entity_alloc: EntityIdAllocator) -> Self {
        Self {
            entity_alloc,
            capacity: None,
            known_components: HashSet::new(),
            live_entities: BTreeSet::new(),
            retired_entities: HashSet::new(),
            columns: HashMap::new(),
            current_version: 0,
            pending: ChangeSet::default(),
            change_log: BTreeMap::new(),
        }
    }

    /// Create a store with a standalone allocator, for tests and tools that
    /// don't need container-wide id uniqueness.
    #[must_use]
    pub fn standalone() -> Self {
        Self::new(EntityIdAllocator::new())
    }

    /// Bound the number of simultaneously live entities this store will hold.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Declare a component type as valid for `attach`/`get` in this store.
    ///
    /// Called once per component a module introduces, at module install
    /// time, before any match using that module starts ticking.
    pub fn register_component(&mut self, type_id: ComponentTypeId) {
        self.known_components.insert(type_id);
    }

    /// Current closed version (the store's tick counter).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current_version
    }

    /// Number of currently live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.live_entities.len()
    }

    /// Allocate a new entity. It exists immediately with no components bound.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::ResourceExhausted`] if this store's capacity
    /// (set via [`ComponentStore::with_capacity`]) would be exceeded.
    pub fn spawn(&mut self) -> Result<EntityId> {
        if let Some(cap) = self.capacity {
            if self.live_entities.len() >= cap {
                return Err(StormError::ResourceExhausted(format!(
                    "component store at entity capacity ({cap})"
                )));
            }
        }

        let id = self.entity_alloc.next();
        self.live_entities.insert(id);
        self.pending.spawned.push(id);
        trace!("spawned entity {id}");
        Ok(id)
    }

    /// Remove an entity and every component bound to it.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::EntityNotFound`] if `entity` is not live.
    pub fn despawn(&mut self, entity: EntityId) -> Result<()> {
        if !self.live_entities.remove(&entity) {
            return Err(StormError::EntityNotFound(entity));
        }

        for column in self.columns.values_mut() {
            column.remove(&entity);
        }
        self.retired_entities.insert(entity);
        self.pending.despawned.push(entity);
        trace!("despawned entity {entity}");
        Ok(())
    }

    /// Check whether `entity` is currently live.
    #[must_use]
    pub fn exists(&self, entity: EntityId) -> bool {
        self.live_entities.contains(&entity)
    }

    /// Create or overwrite a component binding on `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::EntityNotFound`] if `entity` is not live, or
    /// [`StormError::UnknownComponent`] if `type_id` was never registered
    /// via [`ComponentStore::register_component`].
    pub fn attach(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        value: ComponentValue,
    ) -> Result<()> {
        self.check_bindable(entity, type_id)?;

        self.columns.entry(type_id).or_default().insert(entity, value);
        self.pending
            .updated
            .push(ComponentUpdate::set(entity, type_id, value));
        Ok(())
    }

    /// Remove a single component binding from `entity`, recording a
    /// tombstone in the change log.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::EntityNotFound`] if `entity` is not live, or
    /// [`StormError::UnknownComponent`] if `type_id` was never registered.
    pub fn detach(&mut self, entity: EntityId, type_id: ComponentTypeId) -> Result<()> {
        self.check_bindable(entity, type_id)?;

        if let Some(column) = self.columns.get_mut(&type_id) {
            column.remove(&entity);
        }
        self.pending
            .updated
            .push(ComponentUpdate::tombstone(entity, type_id));
        Ok(())
    }

    fn check_bindable(&self, entity: EntityId, type_id: ComponentTypeId) -> Result<()> {
        if !self.live_entities.contains(&entity) {
            return Err(StormError::EntityNotFound(entity));
        }
        if !self.known_components.contains(&type_id) {
            return Err(StormError::UnknownComponent(type_id));
        }
        Ok(())
    }

    /// Look up a single component binding.
    #[must_use]
    pub fn get(&self, entity: EntityId, type_id: ComponentTypeId) -> Option<ComponentValue> {
        self.columns.get(&type_id)?.get(&entity).copied()
    }

    /// Check whether a component is bound, without materializing its value.
    #[must_use]
    pub fn has(&self, entity: EntityId, type_id: ComponentTypeId) -> bool {
        self.columns
            .get(&type_id)
            .is_some_and(|column| column.contains_key(&entity))
    }

    /// Entities bearing every component type in `types`, sorted by
    /// `EntityId` (stable within a version; no guarantee across versions).
    #[must_use]
    pub fn query(&self, types: &[ComponentTypeId]) -> Vec<EntityId> {
        let Some((first, rest)) = types.split_first() else {
            return self.live_entities.iter().copied().collect();
        };

        let Some(first_column) = self.columns.get(first) else {
            return Vec::new();
        };

        first_column
            .keys()
            .filter(|&&entity| {
                self.live_entities.contains(&entity)
                    && rest.iter().all(|t| self.has(entity, *t))
            })
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn materialize(&self, entity: EntityId) -> EntitySnapshot {
        let mut snap = EntitySnapshot::new(entity);
        for (&type_id, column) in &self.columns {
            if let Some(&value) = column.get(&entity) {
                snap.set_component(type_id, value);
            }
        }
        snap
    }

    /// Materialize the entire match state as a [`WorldSnapshot`] at the
    /// current version.
    #[must_use]
    pub fn snapshot_full(&self) -> WorldSnapshot {
        let entities = self
            .live_entities
            .iter()
            .map(|&id| self.materialize(id))
            .collect();
        WorldSnapshot::with_timestamp(self.current_version, now_millis(), entities)
    }

    /// Changes recorded strictly after `from_version`, up to and including
    /// the current version. Empty if `from_version == self.version()`.
    #[must_use]
    pub fn delta_since(&self, from_version: u64) -> WorldDelta {
        let mut spawned_ids: BTreeSet<EntityId> = BTreeSet::new();
        let mut despawned_ids: BTreeSet<EntityId> = BTreeSet::new();
        let mut updated: BTreeMap<(EntityId, ComponentTypeId), Option<ComponentValue>> =
            BTreeMap::new();

        let range_start = from_version.saturating_add(1);
        for changes in self
            .change_log
            .range(range_start..=self.current_version)
            .map(|(_, c)| c)
        {
            for &e in &changes.spawned {
                spawned_ids.insert(e);
            }
            for &e in &changes.despawned {
                spawned_ids.remove(&e);
                despawned_ids.insert(e);
            }
            for u in &changes.updated {
                updated.insert((u.entity, u.component_type), u.value);
            }
        }

        updated.retain(|(e, _), _| !spawned_ids.contains(e) && !despawned_ids.contains(e));

        WorldDelta {
            from_tick: from_version,
            to_tick: self.current_version,
            spawned: spawned_ids.iter().map(|&id| self.materialize(id)).collect(),
            despawned: despawned_ids.into_iter().collect(),
            updated: updated
                .into_iter()
                .map(|((entity, component_type), value)| ComponentUpdate {
                    entity,
                    component_type,
                    value,
                })
                .collect(),
        }
    }

    /// Atomically close the current tick's change set and return the new
    /// version number.
    pub fn advance_version(&mut self) -> u64 {
        let closed = std::mem::take(&mut self.pending);
        self.current_version += 1;
        if !closed.is_empty() {
            debug!(
                "store version {} closed: {} spawned, {} despawned, {} updated",
                self.current_version,
                closed.spawned.len(),
                closed.despawned.len(),
                closed.updated.len()
            );
        }
        self.change_log.insert(self.current_version, closed);
        self.current_version
    }

    /// Drop change-log entries for versions strictly before `keep_from`,
    /// bounding memory growth for long-running matches.
    pub fn prune_history(&mut self, keep_from: u64) {
        let before = self.change_log.len();
        self.change_log.retain(|&version, _| version >= keep_from);
        let removed = before - self.change_log.len();
        if removed > 0 {
            warn!(
                "pruned {removed} change-log entries before version {keep_from}; \
                 subscribers behind that version must resync from a full snapshot"
            );
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Thread-safe handle to a [`ComponentStore`], shared between the match's
/// tick driver and the snapshot engine's read-only consumers.
pub type SharedStore = Arc<RwLock<ComponentStore>>;

/// Wrap a store for shared access.
#[must_use]
pub fn shared(store: ComponentStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}
