//! # Grow-Only Value Set
//!
//! Bounded, append-only history per entity. Used for event streams such as
//! pointer results, where every replica should see every entry and nothing
//! is ever overwritten.
//!
//! ## Design
//!
//! - Entries are ordered by a timestamp extracted from the value itself
//! - When an entity exceeds `max_elements`, the oldest entries are dropped
//! - Readers get an immutable `Arc<[T]>` snapshot rebuilt on every append
//! - Local appends are queued verbatim as APPEND_VALUE messages

use std::collections::HashMap;
use std::sync::Arc;

use tessera_shared::{ByteBuffer, ComponentId, CrdtMessage, Entity};
use tracing::warn;

use super::component::{ComponentDefinition, ComponentType, CrdtUpdate, DirtySet, Schema};

/// Configuration of a grow-only value set.
pub struct GrowOnlySetOptions<T> {
    /// Entries retained per entity.
    pub max_elements: usize,
    /// Extracts the ordering key of an entry.
    pub timestamp: fn(&T) -> u64,
}

impl<T> Clone for GrowOnlySetOptions<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GrowOnlySetOptions<T> {}

impl<T> std::fmt::Debug for GrowOnlySetOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrowOnlySetOptions")
            .field("max_elements", &self.max_elements)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Timestamped<T> {
    value: T,
    timestamp: u64,
}

#[derive(Debug)]
struct EntityValues<T> {
    raw: Vec<Timestamped<T>>,
    frozen: Arc<[T]>,
}

/// Grow-only value-set component store.
pub struct GrowOnlySet<T: Schema + Clone> {
    id: ComponentId,
    name: String,
    options: GrowOnlySetOptions<T>,
    data: HashMap<Entity, EntityValues<T>>,
    dirty: DirtySet,
    queued: Vec<CrdtMessage>,
}

impl<T: Schema + Clone> GrowOnlySet<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>, options: GrowOnlySetOptions<T>) -> Self {
        Self {
            id,
            name: name.into(),
            options,
            data: HashMap::new(),
            dirty: DirtySet::default(),
            queued: Vec::new(),
        }
    }

    /// Appends a local value and queues it for replication.
    ///
    /// Returns the entity's snapshot after the append.
    pub fn add_value(&mut self, entity: Entity, value: T) -> Arc<[T]> {
        let data = value.to_bytes();
        let snapshot = self.append_value(entity, value);
        self.dirty.insert(entity);
        self.queued.push(CrdtMessage::append(entity, self.id, 0, data));
        snapshot
    }

    fn append_value(&mut self, entity: Entity, value: T) -> Arc<[T]> {
        let timestamp = (self.options.timestamp)(&value);
        let max_elements = self.options.max_elements;
        let entry = self.data.entry(entity).or_insert_with(|| EntityValues {
            raw: Vec::new(),
            frozen: Arc::from(Vec::new()),
        });

        entry.raw.push(Timestamped { value, timestamp });
        if let [.., prev, last] = entry.raw.as_slice() {
            if last.timestamp <= prev.timestamp {
                entry.raw.sort_by_key(|e| e.timestamp);
            }
        }

        let excess = entry.raw.len().saturating_sub(max_elements);
        entry.raw.drain(..excess);

        entry.frozen = entry.raw.iter().map(|e| e.value.clone()).collect();
        Arc::clone(&entry.frozen)
    }

    /// Snapshot of the entity's entries, oldest first. Empty if none.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Arc<[T]> {
        self.data
            .get(&entity)
            .map_or_else(|| Arc::from(Vec::new()), |v| Arc::clone(&v.frozen))
    }

    /// True if the entity has at least one entry.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: Entity) -> bool {
        self.data.contains_key(&entity)
    }

    /// Iterates `(entity, snapshot)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &Arc<[T]>)> + '_ {
        self.data.iter().map(|(&e, v)| (e, &v.frozen))
    }

    /// Configured retention bound.
    #[inline]
    #[must_use]
    pub const fn max_elements(&self) -> usize {
        self.options.max_elements
    }

    /// Drains queued local appends and clears dirty tracking.
    pub fn get_crdt_updates(&mut self) -> Vec<CrdtMessage> {
        self.dirty.clear();
        std::mem::take(&mut self.queued)
    }
}

impl<T: Schema + Clone> std::fmt::Debug for GrowOnlySet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrowOnlySet")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entities", &self.data.len())
            .field("queued", &self.queued.len())
            .finish_non_exhaustive()
    }
}

impl<T: Schema + Clone> ComponentDefinition for GrowOnlySet<T> {
    fn component_id(&self) -> ComponentId {
        self.id
    }

    fn component_name(&self) -> &str {
        &self.name
    }

    fn component_type(&self) -> ComponentType {
        ComponentType::GrowOnlyValueSet
    }

    fn has(&self, entity: Entity) -> bool {
        self.data.contains_key(&entity)
    }

    fn entity_deleted(&mut self, entity: Entity, _mark_as_dirty: bool) {
        self.data.remove(&entity);
        self.dirty.remove(entity);
    }

    fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<_> = self.data.keys().copied().collect();
        entities.sort_unstable();
        entities
    }

    fn dirty_entities(&self) -> Vec<Entity> {
        self.dirty.to_vec()
    }

    fn crdt_updates(&mut self) -> Vec<CrdtMessage> {
        self.get_crdt_updates()
    }

    fn update_from_crdt(&mut self, message: &CrdtMessage) -> CrdtUpdate {
        let CrdtMessage::AppendValue(append) = message else {
            return CrdtUpdate::accepted(None);
        };
        match T::from_bytes(&append.data) {
            Ok(value) => {
                self.append_value(append.entity, value);
                CrdtUpdate::accepted(Some(append.data.clone()))
            }
            Err(err) => {
                warn!(
                    component = %self.name,
                    entity = %append.entity,
                    error = %err,
                    "dropping undecodable appended value"
                );
                CrdtUpdate::rejected()
            }
        }
    }

    fn dump_crdt_state_to_buffer(
        &self,
        buf: &mut ByteBuffer,
        filter: &dyn Fn(&CrdtMessage) -> bool,
    ) {
        for entity in self.entities() {
            let Some(values) = self.data.get(&entity) else {
                continue;
            };
            for entry in &values.raw {
                let message = CrdtMessage::append(entity, self.id, 0, entry.value.to_bytes());
                if filter(&message) {
                    message.write_to(buf);
                }
            }
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
