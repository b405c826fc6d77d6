//! # Replicated Entity Component System
//!
//! Entity lifecycle plus the two CRDT component stores.
//!
//! ## Design Philosophy
//!
//! - Every local mutation is recorded as dirty and drained as CRDT messages
//! - Every remote message is merged with a deterministic, total rule
//! - Stores are type-erased behind one object-safe trait for routing
//! - No I/O: transports live in the engine crate

mod component;
mod entity;
mod grow_only_set;
mod lww;
mod world;

pub use component::{
    component_number_from_name, core_component_name, is_static_component, ComponentDefinition,
    ComponentType, CrdtUpdate, Schema, CORE_COMPONENTS,
};
pub use entity::{EntityContainer, EntityState, VersionGSet};
pub use grow_only_set::{GrowOnlySet, GrowOnlySetOptions};
pub use lww::{data_compare, LwwComponent, LwwUpdates, ProcessMessageResult};
pub use world::{ComponentHandle, ValueSetHandle, World};
