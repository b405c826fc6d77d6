//! Decoded CRDT message bodies.

use crate::buffer::ByteBuffer;
use crate::ids::{ComponentId, Entity};

use super::operations::{AppendValue, DeleteComponent, DeleteEntity, PutComponent};
use super::CrdtMessageType;

/// PUT_COMPONENT body: full replacement of an LWW value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutComponentMessage {
    /// Target entity.
    pub entity: Entity,
    /// Target component.
    pub component_id: ComponentId,
    /// Lamport timestamp of the write.
    pub timestamp: u32,
    /// Serialized component value.
    pub data: Vec<u8>,
}

/// DELETE_COMPONENT body: tombstone for an LWW value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteComponentMessage {
    /// Target entity.
    pub entity: Entity,
    /// Target component.
    pub component_id: ComponentId,
    /// Lamport timestamp of the delete.
    pub timestamp: u32,
}

/// DELETE_ENTITY body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteEntityMessage {
    /// Entity being removed.
    pub entity: Entity,
}

/// APPEND_VALUE body: one entry for a grow-only value set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendValueMessage {
    /// Target entity.
    pub entity: Entity,
    /// Target component.
    pub component_id: ComponentId,
    /// Always 0 when produced by this peer; ordering comes from the value.
    pub timestamp: u32,
    /// Serialized entry.
    pub data: Vec<u8>,
}

/// Any decoded CRDT message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CrdtMessage {
    /// See [`PutComponentMessage`].
    PutComponent(PutComponentMessage),
    /// See [`DeleteComponentMessage`].
    DeleteComponent(DeleteComponentMessage),
    /// See [`DeleteEntityMessage`].
    DeleteEntity(DeleteEntityMessage),
    /// See [`AppendValueMessage`].
    AppendValue(AppendValueMessage),
}

impl CrdtMessage {
    /// Builds a PUT_COMPONENT message.
    #[must_use]
    pub fn put(entity: Entity, component_id: ComponentId, timestamp: u32, data: Vec<u8>) -> Self {
        Self::PutComponent(PutComponentMessage {
            entity,
            component_id,
            timestamp,
            data,
        })
    }

    /// Builds a DELETE_COMPONENT message.
    #[must_use]
    pub fn delete(entity: Entity, component_id: ComponentId, timestamp: u32) -> Self {
        Self::DeleteComponent(DeleteComponentMessage {
            entity,
            component_id,
            timestamp,
        })
    }

    /// Builds a DELETE_ENTITY message.
    #[must_use]
    pub fn delete_entity(entity: Entity) -> Self {
        Self::DeleteEntity(DeleteEntityMessage { entity })
    }

    /// Builds an APPEND_VALUE message.
    #[must_use]
    pub fn append(entity: Entity, component_id: ComponentId, timestamp: u32, data: Vec<u8>) -> Self {
        Self::AppendValue(AppendValueMessage {
            entity,
            component_id,
            timestamp,
            data,
        })
    }

    /// Wire type of this message.
    #[inline]
    #[must_use]
    pub const fn message_type(&self) -> CrdtMessageType {
        match self {
            Self::PutComponent(_) => CrdtMessageType::PutComponent,
            Self::DeleteComponent(_) => CrdtMessageType::DeleteComponent,
            Self::DeleteEntity(_) => CrdtMessageType::DeleteEntity,
            Self::AppendValue(_) => CrdtMessageType::AppendValue,
        }
    }

    /// Entity the message targets.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> Entity {
        match self {
            Self::PutComponent(m) => m.entity,
            Self::DeleteComponent(m) => m.entity,
            Self::DeleteEntity(m) => m.entity,
            Self::AppendValue(m) => m.entity,
        }
    }

    /// Component the message targets. `None` for DELETE_ENTITY.
    #[inline]
    #[must_use]
    pub const fn component_id(&self) -> Option<ComponentId> {
        match self {
            Self::PutComponent(m) => Some(m.component_id),
            Self::DeleteComponent(m) => Some(m.component_id),
            Self::DeleteEntity(_) => None,
            Self::AppendValue(m) => Some(m.component_id),
        }
    }

    /// Message timestamp. `None` for DELETE_ENTITY.
    #[inline]
    #[must_use]
    pub const fn timestamp(&self) -> Option<u32> {
        match self {
            Self::PutComponent(m) => Some(m.timestamp),
            Self::DeleteComponent(m) => Some(m.timestamp),
            Self::DeleteEntity(_) => None,
            Self::AppendValue(m) => Some(m.timestamp),
        }
    }

    /// Payload bytes, for the message types that carry one.
    #[inline]
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::PutComponent(m) => Some(&m.data),
            Self::AppendValue(m) => Some(&m.data),
            Self::DeleteComponent(_) | Self::DeleteEntity(_) => None,
        }
    }

    /// True if both messages address the same (entity, component) slot.
    #[must_use]
    pub fn same_target(&self, other: &Self) -> bool {
        self.entity() == other.entity() && self.component_id() == other.component_id()
    }

    /// Appends the encoded message to `buf`.
    pub fn write_to(&self, buf: &mut ByteBuffer) {
        match self {
            Self::PutComponent(m) => {
                PutComponent::write(m.entity, m.timestamp, m.component_id, &m.data, buf);
            }
            Self::DeleteComponent(m) => {
                DeleteComponent::write(m.entity, m.component_id, m.timestamp, buf);
            }
            Self::DeleteEntity(m) => DeleteEntity::write(m.entity, buf),
            Self::AppendValue(m) => {
                AppendValue::write(m.entity, m.timestamp, m.component_id, &m.data, buf);
            }
        }
    }

    /// Encodes the message into a fresh byte vector.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::new();
        self.write_to(&mut buf);
        buf.into_vec()
    }
}
