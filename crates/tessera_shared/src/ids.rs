//! # Identifiers
//!
//! Entities and components travel the wire as plain `u32`s. These newtypes
//! keep them from being mixed up on this side of the wire.

use std::fmt;

use crate::constants::MAX_U16;

/// Generation-tagged entity identifier.
///
/// The ID is split into two parts:
/// - Lower 16 bits: entity number
/// - Upper 16 bits: version, bumped every time the number is recycled
///
/// Two entities are the same only if both halves match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// The scene root.
    pub const ROOT: Self = Self(0);
    /// The local player avatar.
    pub const PLAYER: Self = Self(1);
    /// The main camera.
    pub const CAMERA: Self = Self(2);

    /// Packs an entity number and version into an entity ID.
    #[inline]
    #[must_use]
    pub const fn new(number: u16, version: u16) -> Self {
        Self(((version as u32) << 16) | number as u32)
    }

    /// Wraps a raw wire value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw wire value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the entity number (low 16 bits).
    #[inline]
    #[must_use]
    pub const fn number(self) -> u16 {
        (self.0 & MAX_U16) as u16
    }

    /// Returns the entity version (high 16 bits).
    #[inline]
    #[must_use]
    pub const fn version(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

impl From<u32> for Entity {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Entity> for u32 {
    fn from(entity: Entity) -> Self {
        entity.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.number(), self.version())
    }
}

/// Stable 32-bit component identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentId(pub u32);

impl From<u32> for ComponentId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
