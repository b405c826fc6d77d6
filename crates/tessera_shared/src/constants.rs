//! # Shared Constants
//!
//! Numbers that are part of the wire contract. Changing any of these breaks
//! interoperability with unmodified hosts.

/// Largest value representable in 16 bits.
pub const MAX_U16: u32 = 0xFFFF;

/// Entity numbers below this are reserved (root, player, camera slots).
///
/// Reserved numbers are never generated and never recycled.
pub const RESERVED_STATIC_ENTITIES: u32 = 512;

/// Component ids below this come from the static core table.
///
/// Name-derived ids are offset by this amount so they never collide.
pub const MAX_STATIC_COMPONENT: u32 = 1 << 11;

/// Bytes in every CRDT message header (length + type).
pub const CRDT_MESSAGE_HEADER_LENGTH: usize = 8;

/// Fixed body bytes of PUT_COMPONENT and APPEND_VALUE
/// (entity, component, timestamp, data length).
pub const PUT_COMPONENT_HEADER_LENGTH: usize = 16;

/// Body bytes of DELETE_COMPONENT (entity, component, timestamp).
pub const DELETE_COMPONENT_HEADER_LENGTH: usize = 12;

/// Body bytes of DELETE_ENTITY (entity).
pub const DELETE_ENTITY_HEADER_LENGTH: usize = 4;
