//! # CRDT Wire Protocol
//!
//! Self-delimiting binary messages exchanged between replicas.
//!
//! ## Message Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (8 bytes)                                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Length (4, includes header) │ Type (4)                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Body (type specific, tightly packed, no padding)             │
//! └──────────────────────────────────────────────────────────────┘
//!
//! PUT_COMPONENT / APPEND_VALUE:
//!   entity (4) │ component (4) │ timestamp (4) │ data length (4) │ data
//! DELETE_COMPONENT:
//!   entity (4) │ component (4) │ timestamp (4)
//! DELETE_ENTITY:
//!   entity (4)
//! ```
//!
//! All integers are little-endian. Because the length comes first, a parser
//! can always skip a message it does not understand.

mod message;
mod operations;

pub use message::{
    AppendValueMessage, CrdtMessage, DeleteComponentMessage, DeleteEntityMessage,
    PutComponentMessage,
};
pub use operations::{
    read_message, AppendValue, DeleteComponent, DeleteEntity, Frame, PutComponent,
};

use crate::buffer::ByteBuffer;
use crate::constants::CRDT_MESSAGE_HEADER_LENGTH;

/// Operation carried by a CRDT message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CrdtMessageType {
    /// Never sent. Tag 0 is reserved.
    Reserved = 0,
    /// Replace the value of an LWW component.
    PutComponent = 1,
    /// Tombstone the value of an LWW component.
    DeleteComponent = 2,
    /// Remove an entity and every component attached to it.
    DeleteEntity = 3,
    /// Append one entry to a grow-only value set.
    AppendValue = 4,
}

impl CrdtMessageType {
    /// Converts a raw wire tag. Returns `None` for tags this peer does not know.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Reserved),
            1 => Some(Self::PutComponent),
            2 => Some(Self::DeleteComponent),
            3 => Some(Self::DeleteEntity),
            4 => Some(Self::AppendValue),
            _ => None,
        }
    }
}

/// Decoded message header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrdtMessageHeader {
    /// Total message length in bytes, header included.
    pub length: u32,
    /// Raw type tag. Kept raw so unknown tags can still be skipped.
    pub message_type: u32,
}

impl CrdtMessageHeader {
    /// Returns the known message type, if any.
    #[must_use]
    pub const fn kind(&self) -> Option<CrdtMessageType> {
        CrdtMessageType::from_u32(self.message_type)
    }
}

/// Checks that a complete message is available at the read cursor.
///
/// Returns false when fewer than a header's worth of bytes remain, when the
/// declared length exceeds what is available (partial delivery), or when the
/// declared length is too small to contain its own header.
#[must_use]
pub fn validate(buf: &ByteBuffer) -> bool {
    let remaining = buf.remaining_bytes();
    if remaining < CRDT_MESSAGE_HEADER_LENGTH {
        return false;
    }
    let Ok(length) = buf.get_u32(buf.read_offset()) else {
        return false;
    };
    let length = length as usize;
    length >= CRDT_MESSAGE_HEADER_LENGTH && length <= remaining
}

/// Peeks the header at the read cursor without consuming it.
#[must_use]
pub fn get_header(buf: &ByteBuffer) -> Option<CrdtMessageHeader> {
    if !validate(buf) {
        return None;
    }
    let offset = buf.read_offset();
    Some(CrdtMessageHeader {
        length: buf.get_u32(offset).ok()?,
        message_type: buf.get_u32(offset + 4).ok()?,
    })
}

/// Reads and consumes the header at the read cursor.
pub fn read_header(buf: &mut ByteBuffer) -> Option<CrdtMessageHeader> {
    if !validate(buf) {
        return None;
    }
    Some(CrdtMessageHeader {
        length: buf.read_u32().ok()?,
        message_type: buf.read_u32().ok()?,
    })
}

/// Skips the whole message at the read cursor without decoding it.
///
/// Returns false (and consumes nothing) if no complete message is available.
pub fn consume_message(buf: &mut ByteBuffer) -> bool {
    let Some(header) = get_header(buf) else {
        return false;
    };
    buf.increment_read_offset(header.length as usize).is_ok()
}
