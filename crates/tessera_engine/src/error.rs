//! # Engine Error Types
//!
//! Errors surfaced by the tick loop, transports and configuration loading.

use tessera_core::EcsError;
use tessera_shared::ProtocolError;
use thiserror::Error;

/// Errors raised by a transport or the host bridge behind it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The other end is gone.
    #[error("transport closed")]
    Closed,

    /// The host rejected a call.
    #[error("host error: {0}")]
    Host(String),
}

/// Errors that can occur while running a scene.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Component or entity operation failed.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A CRDT stream could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A transport call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A system with this name is already registered.
    #[error("system '{0}' already added to the engine")]
    DuplicateSystem(String),

    /// A background task failed.
    #[error("task failed: {0}")]
    Task(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;
