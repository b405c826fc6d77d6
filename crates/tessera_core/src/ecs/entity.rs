//! # Entity Identity Manager
//!
//! Hands out entity ids and tracks which ones are alive, pending removal,
//! or gone for good.
//!
//! ## Lifecycle
//!
//! ```text
//!            generate_entity / update_used_entity
//!   Unknown ─────────────────────────────────────▶ UsedEntity
//!                                                     │
//!                                      remove_entity  │
//!                                                     ▼
//!                                               (pending removal)
//!                                                     │
//!                           release_removed_entities  │
//!                                                     ▼
//!   Removed ◀─────────────────────────────────── removed set
//! ```
//!
//! Numbers below [`RESERVED_STATIC_ENTITIES`] are always `Reserved`: they
//! are never generated, recycled, or removed.
//!
//! ## Recycling
//!
//! Once a number has been released, a later `generate_entity` may hand it out
//! again with `version + 1`. The removed set only ever grows, so a stale id
//! from an old version can never come back to life.

use std::collections::{BTreeMap, HashSet};

use tessera_shared::{Entity, MAX_U16, RESERVED_STATIC_ENTITIES};
use tracing::{debug, error};

use crate::error::{EcsError, EcsResult};

/// Where an entity id stands from this replica's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Never seen.
    Unknown,
    /// Alive.
    UsedEntity,
    /// This version (or a newer one) of the number has been removed.
    Removed,
    /// Number below the reserved range.
    Reserved,
}

/// Grow-only map from entity number to the highest removed version.
///
/// Merging is a per-number max, so replicas converge regardless of the order
/// removals are observed in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionGSet {
    versions: BTreeMap<u16, u16>,
}

impl VersionGSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            versions: BTreeMap::new(),
        }
    }

    /// Records that `number` was removed at `version`.
    ///
    /// Returns true if the stored version grew.
    pub fn add_to(&mut self, number: u16, version: u16) -> bool {
        match self.versions.get_mut(&number) {
            Some(stored) if *stored >= version => false,
            Some(stored) => {
                *stored = version;
                true
            }
            None => {
                self.versions.insert(number, version);
                true
            }
        }
    }

    /// True if `version` of `number` (or a newer one) has been removed.
    #[inline]
    #[must_use]
    pub fn has(&self, number: u16, version: u16) -> bool {
        self.versions.get(&number).is_some_and(|&v| v >= version)
    }

    /// Highest removed version of `number`.
    #[inline]
    #[must_use]
    pub fn get(&self, number: u16) -> Option<u16> {
        self.versions.get(&number).copied()
    }

    /// Iterates `(number, version)` pairs in ascending number order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.versions.iter().map(|(&n, &v)| (n, v))
    }

    /// Number of entity numbers with at least one removed version.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// True if nothing has been removed yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Allocates entity ids and tracks their lifecycle.
#[derive(Debug)]
pub struct EntityContainer {
    /// Next never-used entity number.
    entity_counter: u32,
    /// Alive entities, local or learned from remote messages.
    used: HashSet<Entity>,
    /// Removed locally, released at the end of the tick.
    to_remove: Vec<Entity>,
    /// Highest removed version per number.
    removed: VersionGSet,
}

impl Default for EntityContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entity_counter: RESERVED_STATIC_ENTITIES,
            used: HashSet::new(),
            to_remove: Vec::new(),
            removed: VersionGSet::new(),
        }
    }

    // =========================================================================
    // Local lifecycle
    // =========================================================================

    /// Returns a fresh entity id.
    ///
    /// Prefers a never-used number while every handed-out number is alive.
    /// Otherwise recycles the lowest released number whose version can still
    /// be bumped.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityRangeExhausted`] when no number is left.
    pub fn generate_entity(&mut self) -> EcsResult<Entity> {
        if self.used.len() + RESERVED_STATIC_ENTITIES as usize >= self.entity_counter as usize {
            return self.create_new_entity();
        }

        let recycled = self.removed.iter().find_map(|(number, version)| {
            if u32::from(number) < RESERVED_STATIC_ENTITIES || u32::from(version) >= MAX_U16 {
                return None;
            }
            let candidate = Entity::new(number, version + 1);
            (!self.used.contains(&candidate) && !self.to_remove.contains(&candidate))
                .then_some(candidate)
        });

        match recycled {
            Some(entity) => {
                debug!(%entity, "recycled entity number");
                self.used.insert(entity);
                Ok(entity)
            }
            None => self.create_new_entity(),
        }
    }

    fn create_new_entity(&mut self) -> EcsResult<Entity> {
        while self.entity_counter <= MAX_U16 {
            let number = u16::try_from(self.entity_counter).map_err(|_| Self::exhausted())?;
            self.entity_counter += 1;

            let version = match self.removed.get(number) {
                None => 0,
                Some(v) if u32::from(v) < MAX_U16 => v + 1,
                Some(_) => continue,
            };
            let entity = Entity::new(number, version);
            if self.used.insert(entity) {
                return Ok(entity);
            }
        }

        error!(
            used = self.used.len(),
            "no entity numbers left to allocate"
        );
        Err(Self::exhausted())
    }

    const fn exhausted() -> EcsError {
        EcsError::EntityRangeExhausted {
            reserved: RESERVED_STATIC_ENTITIES,
        }
    }

    /// Marks an entity for removal.
    ///
    /// An alive entity is deferred until [`release_removed_entities`]; any
    /// other id goes straight into the removed set. Reserved numbers are
    /// refused.
    ///
    /// [`release_removed_entities`]: Self::release_removed_entities
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        if u32::from(entity.number()) < RESERVED_STATIC_ENTITIES {
            return false;
        }

        if self.used.remove(&entity) {
            self.to_remove.push(entity);
        } else {
            self.update_removed_entity(entity);
        }
        true
    }

    /// Moves every pending removal into the removed set.
    ///
    /// Returns the released entities in removal order.
    pub fn release_removed_entities(&mut self) -> Vec<Entity> {
        let released = std::mem::take(&mut self.to_remove);
        for entity in &released {
            self.removed.add_to(entity.number(), entity.version());
        }
        released
    }

    // =========================================================================
    // Remote lifecycle
    // =========================================================================

    /// Records a removal learned from another replica.
    ///
    /// Every alive version up to and including `entity.version()` is dropped.
    /// Returns false for reserved numbers, which are never tracked.
    pub fn update_removed_entity(&mut self, entity: Entity) -> bool {
        let number = entity.number();
        if u32::from(number) < RESERVED_STATIC_ENTITIES {
            return false;
        }
        self.removed.add_to(number, entity.version());
        for version in 0..=entity.version() {
            self.used.remove(&Entity::new(number, version));
        }
        true
    }

    /// Records an entity learned from another replica.
    ///
    /// Returns false for reserved numbers or if that version is already
    /// removed. Seeing version `v` implies every older version of the number
    /// is gone.
    pub fn update_used_entity(&mut self, entity: Entity) -> bool {
        let number = entity.number();
        let version = entity.version();
        if u32::from(number) < RESERVED_STATIC_ENTITIES || self.removed.has(number, version) {
            return false;
        }

        if version > 0 {
            for older in 0..version {
                self.used.remove(&Entity::new(number, older));
            }
            self.removed.add_to(number, version - 1);
        }
        self.used.insert(entity);
        true
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Classifies an entity id.
    #[must_use]
    pub fn entity_state(&self, entity: Entity) -> EntityState {
        if u32::from(entity.number()) < RESERVED_STATIC_ENTITIES {
            EntityState::Reserved
        } else if self.used.contains(&entity) {
            EntityState::UsedEntity
        } else if self.removed.has(entity.number(), entity.version()) {
            EntityState::Removed
        } else {
            EntityState::Unknown
        }
    }

    /// Alive entities, sorted by id.
    #[must_use]
    pub fn existing_entities(&self) -> Vec<Entity> {
        let mut entities: Vec<_> = self.used.iter().copied().collect();
        entities.sort_unstable();
        entities
    }

    /// Number of alive entities.
    #[inline]
    #[must_use]
    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Entities removed locally but not yet released.
    #[inline]
    #[must_use]
    pub fn pending_removals(&self) -> &[Entity] {
        &self.to_remove
    }

    /// The removed set.
    #[inline]
    #[must_use]
    pub const fn removed(&self) -> &VersionGSet {
        &self.removed
    }
}
