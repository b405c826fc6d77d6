//! # TESSERA Shared - Wire Types
//!
//! Everything two replicas must agree on byte-for-byte.
//!
//! ## Contents
//!
//! - **Buffer**: little-endian [`ByteBuffer`] with independent read/write cursors
//! - **Protocol**: self-delimiting CRDT messages (put, delete, delete-entity, append)
//! - **Identifiers**: [`Entity`] (number + version) and [`ComponentId`]
//!
//! ## Example
//!
//! ```rust
//! use tessera_shared::{read_message, ByteBuffer, ComponentId, CrdtMessage, Entity};
//!
//! let entity = Entity::new(512, 0);
//! let mut buf = ByteBuffer::new();
//! CrdtMessage::put(entity, ComponentId(1), 1, vec![42]).write_to(&mut buf);
//!
//! let frame = read_message(&mut buf).unwrap().unwrap();
//! assert_eq!(frame.message.entity(), entity);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod buffer;
pub mod constants;
pub mod error;
pub mod ids;
pub mod protocol;

pub use buffer::ByteBuffer;
pub use constants::*;
pub use error::{BufferError, BufferResult, ProtocolError, ProtocolResult};
pub use ids::{ComponentId, Entity};
pub use protocol::{
    consume_message, get_header, read_header, read_message, validate, AppendValue,
    AppendValueMessage, CrdtMessage, CrdtMessageHeader, CrdtMessageType, DeleteComponent,
    DeleteComponentMessage, DeleteEntity, DeleteEntityMessage, Frame, PutComponent,
    PutComponentMessage,
};
