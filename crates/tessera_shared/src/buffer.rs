//! # Byte Buffer
//!
//! Growable little-endian buffer with independent read and write cursors.
//!
//! ## Layout
//!
//! ```text
//! ┌───────────────┬──────────────────────┬─────────────────┐
//! │ already read  │ unread (remaining)   │ spare capacity  │
//! └───────────────┴──────────────────────┴─────────────────┘
//! 0          read_offset           write_offset
//! ```
//!
//! Writes always append at `write_offset`. Reads always consume from
//! `read_offset` and can never pass `write_offset`. `get_*`/`set_*` access
//! arbitrary offsets inside the written region without moving either cursor,
//! which is how message headers are peeked and back-patched.

use crate::error::{BufferError, BufferResult};

/// Growable byte buffer used for all CRDT encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
    read_offset: usize,
}

macro_rules! le_rw {
    ($write:ident, $read:ident, $ty:ty) => {
        #[doc = concat!("Writes a `", stringify!($ty), "` in little-endian format.")]
        #[inline]
        pub fn $write(&mut self, value: $ty) {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }

        #[doc = concat!("Reads a `", stringify!($ty), "` in little-endian format.")]
        ///
        /// # Errors
        ///
        /// Returns [`BufferError::OutOfBounds`] if not enough unread bytes remain.
        #[inline]
        pub fn $read(&mut self) -> BufferResult<$ty> {
            const SIZE: usize = std::mem::size_of::<$ty>();
            let slice = self.take(SIZE)?;
            let mut raw = [0u8; SIZE];
            raw.copy_from_slice(slice);
            Ok(<$ty>::from_le_bytes(raw))
        }
    };
}

impl ByteBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            read_offset: 0,
        }
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            read_offset: 0,
        }
    }

    /// Wraps already-written bytes for reading.
    ///
    /// The write cursor sits at the end, the read cursor at the start.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            read_offset: 0,
        }
    }

    // =========================================================================
    // Cursors
    // =========================================================================

    /// Returns the current read offset.
    #[inline]
    #[must_use]
    pub const fn read_offset(&self) -> usize {
        self.read_offset
    }

    /// Returns the current write offset (number of bytes written).
    #[inline]
    #[must_use]
    pub fn write_offset(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the number of written bytes not yet read.
    #[inline]
    #[must_use]
    pub fn remaining_bytes(&self) -> usize {
        self.bytes.len() - self.read_offset
    }

    /// Returns true if nothing has been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reserves `len` zeroed bytes at the write cursor.
    ///
    /// Returns the offset the reserved region starts at, so it can be filled
    /// later with the `set_*` family.
    pub fn increment_write_offset(&mut self, len: usize) -> usize {
        let start = self.bytes.len();
        self.bytes.resize(start + len, 0);
        start
    }

    /// Skips `len` unread bytes.
    ///
    /// Returns the offset the skipped region started at.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn increment_read_offset(&mut self, len: usize) -> BufferResult<usize> {
        let start = self.read_offset;
        self.take(len)?;
        Ok(start)
    }

    /// Clears all content and rewinds both cursors.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.read_offset = 0;
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Returns every written byte, read or not.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the unread bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> &[u8] {
        &self.bytes[self.read_offset..]
    }

    /// Returns a copy of every written byte.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Consumes the buffer, returning every written byte.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    // =========================================================================
    // Sequential writes / reads
    // =========================================================================

    le_rw!(write_u8, read_u8, u8);
    le_rw!(write_u16, read_u16, u16);
    le_rw!(write_u32, read_u32, u32);
    le_rw!(write_u64, read_u64, u64);
    le_rw!(write_i8, read_i8, i8);
    le_rw!(write_i16, read_i16, i16);
    le_rw!(write_i32, read_i32, i32);
    le_rw!(write_i64, read_i64, i64);
    le_rw!(write_f32, read_f32, f32);
    le_rw!(write_f64, read_f64, f64);

    /// Writes raw bytes, optionally preceded by a `u32` length.
    pub fn write_bytes(&mut self, value: &[u8], with_length: bool) {
        if with_length {
            self.write_u32(wire_len(value.len()));
        }
        self.bytes.extend_from_slice(value);
    }

    /// Reads a `u32`-length-prefixed byte payload.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::OutOfBounds`] if the prefix or payload is truncated.
    pub fn read_bytes(&mut self) -> BufferResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads exactly `len` raw bytes with no prefix.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_raw(&mut self, len: usize) -> BufferResult<&[u8]> {
        self.take(len)
    }

    /// Writes a UTF-8 string, optionally preceded by a `u32` byte length.
    pub fn write_utf8_string(&mut self, value: &str, with_length: bool) {
        self.write_bytes(value.as_bytes(), with_length);
    }

    /// Reads a `u32`-length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidUtf8`] on malformed text, or
    /// [`BufferError::OutOfBounds`] if truncated.
    pub fn read_utf8_string(&mut self) -> BufferResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| BufferError::InvalidUtf8)
    }

    // =========================================================================
    // Random access
    // =========================================================================

    /// Peeks a `u32` at an absolute offset without moving any cursor.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::OutOfBounds`] if the offset is outside the written region.
    pub fn get_u32(&self, offset: usize) -> BufferResult<u32> {
        let slice = self.slice_at(offset, 4)?;
        Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    /// Overwrites a `u32` at an absolute offset inside the written region.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::OutOfBounds`] if the offset is outside the written region.
    pub fn set_u32(&mut self, offset: usize, value: u32) -> BufferResult<()> {
        let available = self.bytes.len();
        let target = self
            .bytes
            .get_mut(offset..offset + 4)
            .ok_or(BufferError::OutOfBounds {
                offset,
                len: 4,
                available,
            })?;
        target.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn slice_at(&self, offset: usize, len: usize) -> BufferResult<&[u8]> {
        self.bytes
            .get(offset..offset + len)
            .ok_or(BufferError::OutOfBounds {
                offset,
                len,
                available: self.bytes.len(),
            })
    }

    fn take(&mut self, len: usize) -> BufferResult<&[u8]> {
        let start = self.read_offset;
        if len > self.remaining_bytes() {
            return Err(BufferError::OutOfBounds {
                offset: start,
                len,
                available: self.bytes.len(),
            });
        }
        self.read_offset += len;
        Ok(&self.bytes[start..start + len])
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Converts a payload length to its `u32` wire form.
///
/// Payloads are bounded by host message sizes, far below 4 GiB.
#[allow(clippy::cast_possible_truncation)]
#[inline]
#[must_use]
pub(crate) const fn wire_len(len: usize) -> u32 {
    len as u32
}
