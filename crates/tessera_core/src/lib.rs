//! # TESSERA Core - Replicated ECS State
//!
//! Entity-component state that converges across replicas exchanging CRDT
//! messages over an unreliable, ordered transport.
//!
//! ## Architecture Rules
//!
//! 1. **Deterministic merges** - every replica resolves a conflict the same way
//! 2. **Versioned entities** - a removed id can never come back to life
//! 3. **Pure state** - no I/O, no clocks, no async
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::World;
//!
//! let mut world = World::new();
//! let health = world.define_component::<u32>("my-scene::Health").unwrap();
//! let entity = world.add_entity().unwrap();
//! world.component_mut(health).unwrap().create(entity, 100).unwrap();
//!
//! let updates = world.component_mut(health).unwrap().get_crdt_updates().count();
//! assert_eq!(updates, 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ecs;
pub mod error;

pub use ecs::{
    component_number_from_name, core_component_name, data_compare, is_static_component,
    ComponentDefinition, ComponentHandle, ComponentType, CrdtUpdate, EntityContainer, EntityState,
    GrowOnlySet, GrowOnlySetOptions, LwwComponent, LwwUpdates, ProcessMessageResult, Schema,
    ValueSetHandle, VersionGSet, World, CORE_COMPONENTS,
};
pub use error::{EcsError, EcsResult};
