//! # ECS Error Types
//!
//! All errors that can occur while defining components or managing entities.

use tessera_shared::{BufferError, ComponentId, Entity};
use thiserror::Error;

use crate::ecs::ComponentType;

/// Errors that can occur in the replicated ECS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Every non-reserved entity number has been handed out.
    #[error("entity number range exhausted ({reserved}..=65535 in use)")]
    EntityRangeExhausted {
        /// First non-reserved entity number.
        reserved: u32,
    },

    /// A component with this id is already registered.
    #[error("component {name} ({id}) already exists")]
    ComponentAlreadyExists {
        /// Component id.
        id: ComponentId,
        /// Component name.
        name: String,
    },

    /// No component with this id is registered.
    #[error("component {0} not found")]
    ComponentNotFound(ComponentId),

    /// No component with this name is registered.
    #[error("component '{0}' not found")]
    UnknownComponent(String),

    /// The registered component has a different store type or value type.
    #[error("component {name} is a {found:?}, requested {expected:?}")]
    ComponentTypeMismatch {
        /// Component name.
        name: String,
        /// Store type the caller asked for.
        expected: ComponentType,
        /// Store type actually registered.
        found: ComponentType,
    },

    /// `create` was called for an entity that already holds a value.
    #[error("component {name} for entity {entity} already exists")]
    ValueAlreadyExists {
        /// Entity that already holds a value.
        entity: Entity,
        /// Component name.
        name: String,
    },

    /// A hard lookup found no value for the entity.
    #[error("component {name} for entity {entity} not found")]
    ValueNotFound {
        /// Entity without a value.
        entity: Entity,
        /// Component name.
        name: String,
    },

    /// The component set is frozen.
    #[error("engine is sealed, cannot {operation}")]
    Sealed {
        /// Operation that was refused.
        operation: &'static str,
    },

    /// A value failed to deserialize.
    #[error("schema error: {0}")]
    Schema(#[from] BufferError),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
