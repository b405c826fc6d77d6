//! # Wire Error Types
//!
//! Errors raised while reading or decoding CRDT byte streams.

use thiserror::Error;

use crate::protocol::CrdtMessageType;

/// Errors raised by [`ByteBuffer`](crate::ByteBuffer) reads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A read went past the written region of the buffer.
    #[error("read out of bounds: offset {offset} + {len} bytes exceeds {available} available")]
    OutOfBounds {
        /// Offset the read started at.
        offset: usize,
        /// Number of bytes requested.
        len: usize,
        /// Number of bytes written to the buffer.
        available: usize,
    },

    /// A length-prefixed string did not contain valid UTF-8.
    #[error("string payload is not valid utf-8")]
    InvalidUtf8,
}

/// Errors raised by the CRDT operation decoders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A decoder was routed a message of another type.
    ///
    /// Routing happens on the peeked header, so this means the stream is
    /// desynchronized and cannot be trusted any further.
    #[error("expected {expected:?} message, found type tag {found}")]
    UnexpectedMessageType {
        /// The type the decoder handles.
        expected: CrdtMessageType,
        /// The raw type tag found in the header.
        found: u32,
    },

    /// The message body was shorter than its header announced.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Result type for buffer reads.
pub type BufferResult<T> = Result<T, BufferError>;

/// Result type for protocol decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
