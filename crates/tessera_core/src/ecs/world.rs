//! # ECS World
//!
//! Owns the entity container and every component store.
//!
//! Stores are kept type-erased behind [`ComponentDefinition`] so the
//! replication engine can route messages by id alone. Typed access goes
//! through the handles returned at definition time.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use tessera_shared::{ComponentId, Entity, RESERVED_STATIC_ENTITIES};
use tracing::{debug, warn};

use super::component::{
    component_number_from_name, ComponentDefinition, ComponentType, Schema,
};
use super::entity::{EntityContainer, EntityState};
use super::grow_only_set::{GrowOnlySet, GrowOnlySetOptions};
use super::lww::LwwComponent;
use crate::error::{EcsError, EcsResult};

/// Typed handle to a last-write-wins component.
pub struct ComponentHandle<T> {
    id: ComponentId,
    _marker: PhantomData<fn() -> T>,
}

/// Typed handle to a grow-only value-set component.
pub struct ValueSetHandle<T> {
    id: ComponentId,
    _marker: PhantomData<fn() -> T>,
}

macro_rules! handle_impls {
    ($handle:ident) => {
        impl<T> $handle<T> {
            const fn new(id: ComponentId) -> Self {
                Self {
                    id,
                    _marker: PhantomData,
                }
            }

            /// Component id.
            #[inline]
            #[must_use]
            pub const fn id(&self) -> ComponentId {
                self.id
            }
        }

        impl<T> Clone for $handle<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $handle<T> {}

        impl<T> fmt::Debug for $handle<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($handle)).field(&self.id).finish()
            }
        }

        impl<T> PartialEq for $handle<T> {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl<T> Eq for $handle<T> {}
    };
}

handle_impls!(ComponentHandle);
handle_impls!(ValueSetHandle);

/// Entity container plus component registry.
pub struct World {
    entities: EntityContainer,
    /// Registration order is preserved; the replication engine sends in it.
    components: Vec<Box<dyn ComponentDefinition>>,
    index: HashMap<ComponentId, usize>,
    sealed: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.used_count())
            .field("components", &self.components.len())
            .field("sealed", &self.sealed)
            .finish()
    }
}

impl World {
    /// Creates an empty, unsealed world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: EntityContainer::new(),
            components: Vec::new(),
            index: HashMap::new(),
            sealed: false,
        }
    }

    // =========================================================================
    // Component definitions
    // =========================================================================

    /// Defines (or looks up) a last-write-wins component.
    ///
    /// Defining an existing name again returns the same handle.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ComponentTypeMismatch`] if the name is taken by another store
    /// - [`EcsError::Sealed`] if the world is sealed and the name is new
    pub fn define_component<T: Schema>(&mut self, name: &str) -> EcsResult<ComponentHandle<T>> {
        let id = component_number_from_name(name);
        if let Some(existing) = self.get_component_or_null(id) {
            if existing.as_any().is::<LwwComponent<T>>() {
                return Ok(ComponentHandle::new(id));
            }
            return Err(Self::mismatch(existing, ComponentType::LastWriteWinElementSet));
        }

        self.register_component_definition(Box::new(LwwComponent::<T>::new(id, name)))?;
        Ok(ComponentHandle::new(id))
    }

    /// Defines (or looks up) a grow-only value-set component.
    ///
    /// # Errors
    ///
    /// Same as [`World::define_component`].
    pub fn define_value_set_component<T: Schema + Clone>(
        &mut self,
        name: &str,
        options: GrowOnlySetOptions<T>,
    ) -> EcsResult<ValueSetHandle<T>> {
        let id = component_number_from_name(name);
        if let Some(existing) = self.get_component_or_null(id) {
            if existing.as_any().is::<GrowOnlySet<T>>() {
                return Ok(ValueSetHandle::new(id));
            }
            return Err(Self::mismatch(existing, ComponentType::GrowOnlyValueSet));
        }

        self.register_component_definition(Box::new(GrowOnlySet::new(id, name, options)))?;
        Ok(ValueSetHandle::new(id))
    }

    /// Registers a pre-built store.
    ///
    /// # Errors
    ///
    /// - [`EcsError::Sealed`] if the world is sealed
    /// - [`EcsError::ComponentAlreadyExists`] if the id is taken
    pub fn register_component_definition(
        &mut self,
        definition: Box<dyn ComponentDefinition>,
    ) -> EcsResult<ComponentId> {
        let id = definition.component_id();
        self.ensure_unsealed("define component")?;
        if self.index.contains_key(&id) {
            return Err(EcsError::ComponentAlreadyExists {
                id,
                name: definition.component_name().to_owned(),
            });
        }

        debug!(component = definition.component_name(), %id, "component defined");
        self.index.insert(id, self.components.len());
        self.components.push(definition);
        Ok(id)
    }

    /// Unregisters a store and hands it back.
    ///
    /// # Errors
    ///
    /// - [`EcsError::Sealed`] if the world is sealed
    /// - [`EcsError::ComponentNotFound`] if no store has that id
    pub fn remove_component_definition(
        &mut self,
        id: ComponentId,
    ) -> EcsResult<Box<dyn ComponentDefinition>> {
        self.ensure_unsealed("remove component")?;
        let slot = self.index.remove(&id).ok_or(EcsError::ComponentNotFound(id))?;
        let removed = self.components.remove(slot);
        for position in self.index.values_mut() {
            if *position > slot {
                *position -= 1;
            }
        }
        Ok(removed)
    }

    /// Freezes the component set.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// True once [`World::seal`] has been called.
    #[inline]
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn ensure_unsealed(&self, operation: &'static str) -> EcsResult<()> {
        if self.sealed {
            warn!(operation, "component set is sealed");
            return Err(EcsError::Sealed { operation });
        }
        Ok(())
    }

    fn mismatch(existing: &dyn ComponentDefinition, expected: ComponentType) -> EcsError {
        EcsError::ComponentTypeMismatch {
            name: existing.component_name().to_owned(),
            expected,
            found: existing.component_type(),
        }
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Allocates a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityRangeExhausted`] when no number is left.
    pub fn add_entity(&mut self) -> EcsResult<Entity> {
        self.entities.generate_entity()
    }

    /// Removes an entity and every value attached to it.
    ///
    /// Component removals are replicated on the next send; the entity id
    /// itself is released at the end of the tick. Reserved entities are
    /// refused and left untouched.
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        if u32::from(entity.number()) < RESERVED_STATIC_ENTITIES {
            return false;
        }
        for component in &mut self.components {
            component.entity_deleted(entity, true);
        }
        self.entities.remove_entity(entity)
    }

    /// Classifies an entity id.
    #[inline]
    #[must_use]
    pub fn entity_state(&self, entity: Entity) -> EntityState {
        self.entities.entity_state(entity)
    }

    /// Flushes pending removals into the removed set.
    pub fn release_removed_entities(&mut self) -> Vec<Entity> {
        self.entities.release_removed_entities()
    }

    /// The entity container.
    #[inline]
    #[must_use]
    pub const fn entity_container(&self) -> &EntityContainer {
        &self.entities
    }

    /// Mutable access to the entity container.
    #[inline]
    pub fn entity_container_mut(&mut self) -> &mut EntityContainer {
        &mut self.entities
    }

    /// Entities holding a value in every listed component.
    ///
    /// Returns an empty list if any id is unknown or the list is empty.
    #[must_use]
    pub fn entities_with(&self, ids: &[ComponentId]) -> Vec<Entity> {
        let Some((first, rest)) = ids.split_first() else {
            return Vec::new();
        };
        let Some(driver) = self.get_component_or_null(*first) else {
            return Vec::new();
        };
        let mut others = Vec::with_capacity(rest.len());
        for id in rest {
            match self.get_component_or_null(*id) {
                Some(component) => others.push(component),
                None => return Vec::new(),
            }
        }

        driver
            .entities()
            .into_iter()
            .filter(|&entity| others.iter().all(|c| c.has(entity)))
            .collect()
    }

    // =========================================================================
    // Typed access
    // =========================================================================

    /// Typed access to an LWW store.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotFound`] if the store was removed.
    pub fn component<T: Schema>(&self, handle: ComponentHandle<T>) -> EcsResult<&LwwComponent<T>> {
        self.typed(handle.id)
    }

    /// Typed mutable access to an LWW store.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotFound`] if the store was removed.
    pub fn component_mut<T: Schema>(
        &mut self,
        handle: ComponentHandle<T>,
    ) -> EcsResult<&mut LwwComponent<T>> {
        self.typed_mut(handle.id)
    }

    /// Typed access to a grow-only store.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotFound`] if the store was removed.
    pub fn value_set<T: Schema + Clone>(
        &self,
        handle: ValueSetHandle<T>,
    ) -> EcsResult<&GrowOnlySet<T>> {
        self.typed(handle.id)
    }

    /// Typed mutable access to a grow-only store.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotFound`] if the store was removed.
    pub fn value_set_mut<T: Schema + Clone>(
        &mut self,
        handle: ValueSetHandle<T>,
    ) -> EcsResult<&mut GrowOnlySet<T>> {
        self.typed_mut(handle.id)
    }

    fn typed<S: ComponentDefinition>(&self, id: ComponentId) -> EcsResult<&S> {
        let component = self.get_component(id)?;
        let found = component.component_type();
        let name = component.component_name();
        component
            .as_any()
            .downcast_ref::<S>()
            .ok_or_else(|| EcsError::ComponentTypeMismatch {
                name: name.to_owned(),
                expected: found,
                found,
            })
    }

    fn typed_mut<S: ComponentDefinition>(&mut self, id: ComponentId) -> EcsResult<&mut S> {
        let component = self.get_component_mut(id)?;
        let found = component.component_type();
        let name = component.component_name().to_owned();
        component
            .as_any_mut()
            .downcast_mut::<S>()
            .ok_or(EcsError::ComponentTypeMismatch {
                name,
                expected: found,
                found,
            })
    }

    // =========================================================================
    // Erased access
    // =========================================================================

    /// Hard lookup by id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if no store has that id.
    pub fn get_component(&self, id: ComponentId) -> EcsResult<&dyn ComponentDefinition> {
        self.get_component_or_null(id)
            .ok_or(EcsError::ComponentNotFound(id))
    }

    /// Hard mutable lookup by id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if no store has that id.
    pub fn get_component_mut(
        &mut self,
        id: ComponentId,
    ) -> EcsResult<&mut (dyn ComponentDefinition + 'static)> {
        self.get_component_or_null_mut(id)
            .ok_or(EcsError::ComponentNotFound(id))
    }

    /// Soft lookup by id.
    #[must_use]
    pub fn get_component_or_null(&self, id: ComponentId) -> Option<&dyn ComponentDefinition> {
        let slot = *self.index.get(&id)?;
        self.components.get(slot).map(|c| &**c)
    }

    /// Soft mutable lookup by id.
    pub fn get_component_or_null_mut(
        &mut self,
        id: ComponentId,
    ) -> Option<&mut (dyn ComponentDefinition + 'static)> {
        let slot = *self.index.get(&id)?;
        self.components.get_mut(slot).map(|c| &mut **c)
    }

    /// Lookup by registered name.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if no store has that name.
    pub fn component_by_name(&self, name: &str) -> EcsResult<&dyn ComponentDefinition> {
        self.get_component_or_null(component_number_from_name(name))
            .filter(|c| c.component_name() == name)
            .ok_or_else(|| EcsError::UnknownComponent(name.to_owned()))
    }

    /// Every store, in registration order.
    pub fn components(
        &self,
    ) -> impl Iterator<Item = &(dyn ComponentDefinition + 'static)> + '_ {
        self.components.iter().map(|c| &**c)
    }

    /// Every store mutably, in registration order.
    pub fn components_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut (dyn ComponentDefinition + 'static)> + '_ {
        self.components.iter_mut().map(|c| &mut **c)
    }

    /// Number of registered stores.
    #[inline]
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}
