//! # Last-Write-Wins Element Set
//!
//! One value per entity. Every write carries a Lamport timestamp and the
//! highest timestamp wins.
//!
//! ## Conflict Rule
//!
//! ```text
//! no local timestamp, or local < incoming  -> take incoming
//! local > incoming                          -> keep local, send correction
//! equal timestamps:
//!   DELETE and nothing stored               -> no change
//!   compare serialized bytes (absent lowest,
//!   then shorter first, then first differing
//!   byte); the larger payload wins
//! ```
//!
//! The rule is a total order over `(timestamp, bytes)`, so every replica
//! picks the same winner no matter which message it saw first.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tessera_shared::{ByteBuffer, ComponentId, CrdtMessage, Entity};
use tracing::warn;

use super::component::{ComponentDefinition, ComponentType, CrdtUpdate, DirtySet, Schema};
use crate::error::{EcsError, EcsResult};

/// Result of running the conflict rule against a remote message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessMessageResult {
    /// Remote timestamp is newer. Take it.
    StateUpdatedTimestamp,
    /// Local timestamp is newer. Correct the sender.
    StateOutdatedTimestamp,
    /// Same timestamp and same bytes.
    NoChanges,
    /// Same timestamp, local bytes win. Correct the sender.
    StateOutdatedData,
    /// Same timestamp, remote bytes win. Take them.
    StateUpdatedData,
}

/// Orders two serialized payloads for timestamp ties.
///
/// Absent is lowest, then the shorter payload, then the first differing byte.
#[must_use]
pub fn data_compare(a: Option<&[u8]>, b: Option<&[u8]>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

/// Last-write-wins component store.
#[derive(Debug)]
pub struct LwwComponent<T: Schema> {
    id: ComponentId,
    name: String,
    values: HashMap<Entity, T>,
    /// Kept after deletion so stale writes stay rejected.
    timestamps: HashMap<Entity, u32>,
    dirty: DirtySet,
}

impl<T: Schema> LwwComponent<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            values: HashMap::new(),
            timestamps: HashMap::new(),
            dirty: DirtySet::default(),
        }
    }

    // =========================================================================
    // Local writes
    // =========================================================================

    /// Attaches a value to an entity that has none.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ValueAlreadyExists`] if the entity already holds one.
    pub fn create(&mut self, entity: Entity, value: T) -> EcsResult<&mut T> {
        if self.values.contains_key(&entity) {
            return Err(EcsError::ValueAlreadyExists {
                entity,
                name: self.name.clone(),
            });
        }
        Ok(self.create_or_replace(entity, value))
    }

    /// Attaches or overwrites a value.
    pub fn create_or_replace(&mut self, entity: Entity, value: T) -> &mut T {
        self.dirty.insert(entity);
        match self.values.entry(entity) {
            Entry::Occupied(mut slot) => {
                slot.insert(value);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(value),
        }
    }

    /// Mutable access. Marks the entity dirty.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let value = self.values.get_mut(&entity)?;
        self.dirty.insert(entity);
        Some(value)
    }

    /// Mutable access, inserting `default()` first if the entity holds no
    /// value. Marks the entity dirty.
    pub fn get_or_create_mut(&mut self, entity: Entity, default: impl FnOnce() -> T) -> &mut T {
        self.dirty.insert(entity);
        self.values.entry(entity).or_insert_with(default)
    }

    /// Hard mutable access. Marks the entity dirty.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ValueNotFound`] if the entity holds no value.
    pub fn get_mut_checked(&mut self, entity: Entity) -> EcsResult<&mut T> {
        match self.values.get_mut(&entity) {
            Some(value) => {
                self.dirty.insert(entity);
                Ok(value)
            }
            None => Err(EcsError::ValueNotFound {
                entity,
                name: self.name.clone(),
            }),
        }
    }

    /// Removes the value and replicates the removal.
    pub fn delete_from(&mut self, entity: Entity) -> Option<T> {
        let removed = self.values.remove(&entity);
        if removed.is_some() {
            self.dirty.insert(entity);
        }
        removed
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Soft read.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.values.get(&entity)
    }

    /// Hard read.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ValueNotFound`] if the entity holds no value.
    pub fn get_checked(&self, entity: Entity) -> EcsResult<&T> {
        self.values.get(&entity).ok_or_else(|| self.not_found(entity))
    }

    /// True if the entity holds a value.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: Entity) -> bool {
        self.values.contains_key(&entity)
    }

    /// Last known timestamp for the entity, including tombstones.
    #[inline]
    #[must_use]
    pub fn timestamp(&self, entity: Entity) -> Option<u32> {
        self.timestamps.get(&entity).copied()
    }

    /// Iterates `(entity, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.values.iter().map(|(&e, v)| (e, v))
    }

    /// Number of entities holding a value.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no entity holds a value.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if the entity has unsent changes.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self, entity: Entity) -> bool {
        self.dirty.contains(entity)
    }

    fn not_found(&self, entity: Entity) -> EcsError {
        EcsError::ValueNotFound {
            entity,
            name: self.name.clone(),
        }
    }

    // =========================================================================
    // Replication
    // =========================================================================

    /// Drains pending local changes, one message per dirty entity.
    ///
    /// Each pop bumps the entity's timestamp, so consecutive messages for an
    /// entity carry strictly increasing timestamps until `u32::MAX`, where the
    /// timestamp stays put. Dropping the iterator early leaves the remaining
    /// entities dirty.
    pub fn get_crdt_updates(&mut self) -> LwwUpdates<'_, T> {
        LwwUpdates { component: self }
    }

    /// Runs the conflict rule for an incoming write without applying it.
    #[must_use]
    pub fn crdt_rule(
        &self,
        entity: Entity,
        timestamp: u32,
        incoming: Option<&[u8]>,
    ) -> ProcessMessageResult {
        let Some(&local) = self.timestamps.get(&entity) else {
            return ProcessMessageResult::StateUpdatedTimestamp;
        };
        match local.cmp(&timestamp) {
            Ordering::Less => return ProcessMessageResult::StateUpdatedTimestamp,
            Ordering::Greater => return ProcessMessageResult::StateOutdatedTimestamp,
            Ordering::Equal => {}
        }

        let stored = self.serialized(entity);
        if incoming.is_none() && stored.is_none() {
            return ProcessMessageResult::NoChanges;
        }
        match data_compare(stored.as_deref(), incoming) {
            Ordering::Equal => ProcessMessageResult::NoChanges,
            Ordering::Greater => ProcessMessageResult::StateOutdatedData,
            Ordering::Less => ProcessMessageResult::StateUpdatedData,
        }
    }

    fn serialized(&self, entity: Entity) -> Option<Vec<u8>> {
        self.values.get(&entity).map(Schema::to_bytes)
    }

    /// Message describing the entity's current state at `timestamp`.
    fn state_message(&self, entity: Entity, timestamp: u32) -> CrdtMessage {
        match self.serialized(entity) {
            Some(data) => CrdtMessage::put(entity, self.id, timestamp, data),
            None => CrdtMessage::delete(entity, self.id, timestamp),
        }
    }

    fn apply(&mut self, entity: Entity, timestamp: u32, incoming: Option<&[u8]>) -> CrdtUpdate {
        match self.crdt_rule(entity, timestamp, incoming) {
            ProcessMessageResult::StateUpdatedTimestamp | ProcessMessageResult::StateUpdatedData => {
                match incoming {
                    Some(data) => match T::from_bytes(data) {
                        Ok(value) => {
                            self.values.insert(entity, value);
                        }
                        Err(err) => {
                            warn!(
                                component = %self.name,
                                %entity,
                                error = %err,
                                "dropping undecodable component payload"
                            );
                            return CrdtUpdate::rejected();
                        }
                    },
                    None => {
                        self.values.remove(&entity);
                    }
                }
                self.timestamps.insert(entity, timestamp);
                CrdtUpdate::accepted(incoming.map(<[u8]>::to_vec))
            }
            ProcessMessageResult::StateOutdatedTimestamp | ProcessMessageResult::StateOutdatedData => {
                let local = self.timestamps.get(&entity).copied().unwrap_or_default();
                let correction = self.state_message(entity, local);
                CrdtUpdate {
                    data: correction.data().map(<[u8]>::to_vec),
                    conflict: Some(correction),
                    rejected: false,
                }
            }
            ProcessMessageResult::NoChanges => CrdtUpdate::accepted(self.serialized(entity)),
        }
    }
}

/// Draining iterator over an LWW store's pending local changes.
pub struct LwwUpdates<'a, T: Schema> {
    component: &'a mut LwwComponent<T>,
}

impl<T: Schema> Iterator for LwwUpdates<'_, T> {
    type Item = CrdtMessage;

    fn next(&mut self) -> Option<CrdtMessage> {
        let component = &mut *self.component;
        let entity = component.dirty.pop_front()?;
        let timestamp = match component.timestamps.get(&entity) {
            None => 1,
            Some(&u32::MAX) => {
                warn!(
                    component = %component.name,
                    %entity,
                    "timestamp saturated, re-sending without a bump"
                );
                u32::MAX
            }
            Some(&ts) => ts + 1,
        };
        component.timestamps.insert(entity, timestamp);
        Some(component.state_message(entity, timestamp))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.component.dirty.len();
        (len, Some(len))
    }
}

impl<T: Schema> ComponentDefinition for LwwComponent<T> {
    fn component_id(&self) -> ComponentId {
        self.id
    }

    fn component_name(&self) -> &str {
        &self.name
    }

    fn component_type(&self) -> ComponentType {
        ComponentType::LastWriteWinElementSet
    }

    fn has(&self, entity: Entity) -> bool {
        self.values.contains_key(&entity)
    }

    fn entity_deleted(&mut self, entity: Entity, mark_as_dirty: bool) {
        if mark_as_dirty {
            self.delete_from(entity);
        } else {
            self.values.remove(&entity);
            self.dirty.remove(entity);
        }
    }

    fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<_> = self.values.keys().copied().collect();
        entities.sort_unstable();
        entities
    }

    fn dirty_entities(&self) -> Vec<Entity> {
        self.dirty.to_vec()
    }

    fn crdt_updates(&mut self) -> Vec<CrdtMessage> {
        self.get_crdt_updates().collect()
    }

    fn update_from_crdt(&mut self, message: &CrdtMessage) -> CrdtUpdate {
        match message {
            CrdtMessage::PutComponent(m) => self.apply(m.entity, m.timestamp, Some(&m.data)),
            CrdtMessage::DeleteComponent(m) => self.apply(m.entity, m.timestamp, None),
            CrdtMessage::DeleteEntity(_) | CrdtMessage::AppendValue(_) => {
                CrdtUpdate::accepted(self.serialized(message.entity()))
            }
        }
    }

    fn dump_crdt_state_to_buffer(
        &self,
        buf: &mut ByteBuffer,
        filter: &dyn Fn(&CrdtMessage) -> bool,
    ) {
        let mut entries: Vec<_> = self.timestamps.iter().map(|(&e, &ts)| (e, ts)).collect();
        entries.sort_unstable();
        for (entity, timestamp) in entries {
            let message = self.state_message(entity, timestamp);
            if filter(&message) {
                message.write_to(buf);
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

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store() -> LwwComponent<Vec<u8>> {
        LwwComponent::new(ComponentId(1), "core::Transform")
    }

    fn entity() -> Entity {
        Entity::new(512, 0)
    }

    fn put(ts: u32, data: &[u8]) -> CrdtMessage {
        CrdtMessage::put(entity(), ComponentId(1), ts, data.to_vec())
    }

    #[test]
    fn test_data_compare() {
        assert_eq!(data_compare(None, None), Ordering::Equal);
        assert_eq!(data_compare(None, Some(&[])), Ordering::Less);
        assert_eq!(data_compare(Some(&[9]), Some(&[1, 1])), Ordering::Less);
        assert_eq!(data_compare(Some(&[1, 3]), Some(&[1, 2])), Ordering::Greater);
        assert_eq!(data_compare(Some(&[4, 4]), Some(&[4, 4])), Ordering::Equal);
    }

    #[test]
    fn test_local_writes_become_put_messages() {
        let mut store = store();
        store.create(entity(), vec![7]).unwrap();
        assert!(store.create(entity(), vec![8]).is_err());

        let updates: Vec<_> = store.get_crdt_updates().collect();
        assert_eq!(updates, vec![put(1, &[7])]);
        assert_eq!(store.timestamp(entity()), Some(1));

        store.get_mut(entity()).unwrap().push(9);
        let updates = store.crdt_updates();
        assert_eq!(updates, vec![put(2, &[7, 9])]);
    }

    #[test]
    fn test_local_delete_keeps_tombstone_timestamp() {
        let mut store = store();
        store.create(entity(), vec![1]).unwrap();
        store.crdt_updates();
        assert_eq!(store.delete_from(entity()), Some(vec![1]));

        let updates = store.crdt_updates();
        assert_eq!(updates, vec![CrdtMessage::delete(entity(), ComponentId(1), 2)]);
        assert_eq!(store.timestamp(entity()), Some(2));

        let stale = store.update_from_crdt(&put(1, &[5]));
        assert_eq!(
            stale.conflict,
            Some(CrdtMessage::delete(entity(), ComponentId(1), 2))
        );
        assert!(!store.has(entity()));
    }

    #[test]
    fn test_newer_remote_timestamp_wins() {
        let mut store = store();
        store.create(entity(), vec![1]).unwrap();
        store.crdt_updates();

        let update = store.update_from_crdt(&put(5, &[2, 2]));
        assert_eq!(update, CrdtUpdate::accepted(Some(vec![2, 2])));
        assert_eq!(store.get(entity()), Some(&vec![2, 2]));
        assert_eq!(store.timestamp(entity()), Some(5));
    }

    #[test]
    fn test_older_remote_timestamp_gets_correction() {
        let mut store = store();
        store.update_from_crdt(&put(9, &[3]));

        let update = store.update_from_crdt(&put(4, &[1]));
        assert_eq!(update.conflict, Some(put(9, &[3])));
        assert_eq!(update.data, Some(vec![3]));
        assert_eq!(store.get(entity()), Some(&vec![3]));
    }

    #[test]
    fn test_equal_timestamp_larger_payload_wins_in_either_order() {
        let mut first = store();
        first.update_from_crdt(&put(7, &[0x01]));
        let update = first.update_from_crdt(&put(7, &[0x02]));
        assert!(update.conflict.is_none());
        assert_eq!(first.get(entity()), Some(&vec![0x02]));

        let mut second = store();
        second.update_from_crdt(&put(7, &[0x02]));
        let update = second.update_from_crdt(&put(7, &[0x01]));
        assert_eq!(update.conflict, Some(put(7, &[0x02])));
        assert_eq!(second.get(entity()), Some(&vec![0x02]));
    }

    #[test]
    fn test_equal_timestamp_put_beats_delete() {
        let mut store = store();
        store.update_from_crdt(&put(3, &[1]));
        let update = store.update_from_crdt(&CrdtMessage::delete(entity(), ComponentId(1), 3));
        assert_eq!(update.conflict, Some(put(3, &[1])));
        assert!(store.has(entity()));
    }

    #[test]
    fn test_delete_without_local_data_is_no_change() {
        let mut store = store();
        store.update_from_crdt(&CrdtMessage::delete(entity(), ComponentId(1), 3));
        let again = store.update_from_crdt(&CrdtMessage::delete(entity(), ComponentId(1), 3));
        assert_eq!(again, CrdtUpdate::accepted(None));
        assert_eq!(
            store.crdt_rule(entity(), 3, None),
            ProcessMessageResult::NoChanges
        );
    }

    #[test]
    fn test_identical_message_is_no_change() {
        let mut store = store();
        store.update_from_crdt(&put(2, &[4, 4]));
        assert_eq!(
            store.crdt_rule(entity(), 2, Some(&[4, 4])),
            ProcessMessageResult::NoChanges
        );
    }

    #[test]
    fn test_undecodable_payload_is_ignored() {
        let mut store: LwwComponent<u32> = LwwComponent::new(ComponentId(3000), "test::Counter");
        let update = store.update_from_crdt(&CrdtMessage::put(entity(), ComponentId(3000), 1, vec![1]));
        assert_eq!(update, CrdtUpdate::rejected());
        assert!(!store.has(entity()));
        assert_eq!(store.timestamp(entity()), None);
    }

    #[test]
    fn test_get_or_create_mut_inserts_once_and_marks_dirty() {
        let mut store = store();
        store.get_or_create_mut(entity(), || vec![1]).push(2);
        store.get_or_create_mut(entity(), || vec![9]).push(3);
        assert_eq!(store.get(entity()), Some(&vec![1, 2, 3]));

        assert_eq!(store.crdt_updates(), vec![put(1, &[1, 2, 3])]);
        store.get_or_create_mut(entity(), Vec::new);
        assert_eq!(store.dirty_entities(), vec![entity()]);
    }

    #[test]
    fn test_saturated_timestamp_is_resent_unchanged() {
        let mut store = store();
        store.update_from_crdt(&put(u32::MAX, &[1]));
        store.get_mut(entity()).unwrap().push(2);
        assert_eq!(store.crdt_updates(), vec![put(u32::MAX, &[1, 2])]);
    }

    #[test]
    fn test_partial_drain_leaves_rest_dirty() {
        let mut store = store();
        let (a, b) = (Entity::new(600, 0), Entity::new(601, 0));
        store.create(a, vec![1]).unwrap();
        store.create(b, vec![2]).unwrap();

        let first = store.get_crdt_updates().next();
        assert_eq!(first.map(|m| m.entity()), Some(a));
        assert_eq!(store.dirty_entities(), vec![b]);
        assert_eq!(store.get_crdt_updates().count(), 1);
    }

    #[test]
    fn test_entity_deleted_with_and_without_dirty() {
        let mut store = store();
        store.update_from_crdt(&put(1, &[1]));
        store.entity_deleted(entity(), false);
        assert!(!store.has(entity()));
        assert!(store.dirty_entities().is_empty());

        store.create(entity(), vec![2]).unwrap();
        store.crdt_updates();
        store.entity_deleted(entity(), true);
        assert_eq!(store.dirty_entities(), vec![entity()]);
    }

    #[test]
    fn test_dump_state_respects_filter() {
        let mut store = store();
        let (a, b) = (Entity::new(600, 0), Entity::new(601, 0));
        store.create(a, vec![1]).unwrap();
        store.create(b, vec![2]).unwrap();
        store.crdt_updates();
        store.delete_from(b);
        store.crdt_updates();

        let mut all = ByteBuffer::new();
        store.dump_crdt_state_to_buffer(&mut all, &|_| true);
        let mut only_puts = ByteBuffer::new();
        store.dump_crdt_state_to_buffer(&mut only_puts, &|m| m.data().is_some());

        let mut expected = ByteBuffer::new();
        CrdtMessage::put(a, ComponentId(1), 1, vec![1]).write_to(&mut expected);
        assert_eq!(only_puts.as_slice(), expected.as_slice());
        CrdtMessage::delete(b, ComponentId(1), 2).write_to(&mut expected);
        assert_eq!(all.as_slice(), expected.as_slice());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Write(u16, u8),
        Delete(u16),
        Remote(u16, u32, u8),
        Drain,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u16..4, any::<u8>()).prop_map(|(e, v)| Op::Write(e, v)),
            (0u16..4).prop_map(Op::Delete),
            (0u16..4, 0u32..40, any::<u8>()).prop_map(|(e, ts, v)| Op::Remote(e, ts, v)),
            Just(Op::Drain),
        ]
    }

    proptest! {
        #[test]
        fn prop_local_timestamps_strictly_increase(ops in prop::collection::vec(op(), 1..120)) {
            let mut store = store();
            let mut last_sent: HashMap<Entity, u32> = HashMap::new();

            for op in ops {
                match op {
                    Op::Write(e, v) => {
                        store.create_or_replace(Entity::new(600 + e, 0), vec![v]);
                    }
                    Op::Delete(e) => {
                        store.delete_from(Entity::new(600 + e, 0));
                    }
                    Op::Remote(e, ts, v) => {
                        let message = CrdtMessage::put(Entity::new(600 + e, 0), ComponentId(1), ts, vec![v]);
                        store.update_from_crdt(&message);
                    }
                    Op::Drain => {
                        for message in store.get_crdt_updates() {
                            let Some(ts) = message.timestamp() else { continue };
                            if let Some(&previous) = last_sent.get(&message.entity()) {
                                prop_assert!(ts > previous);
                            }
                            last_sent.insert(message.entity(), ts);
                        }
                    }
                }
            }
        }
    }
}
