//! # Transports
//!
//! A transport is one replication peer: the renderer, another replica, a
//! test harness. The replication engine owns every transport and talks to it
//! through the [`Transport`] trait.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐  send(bytes)   ┌────────────┐
//! │  CrdtSystem  │ ─────────────► │ Transport  │ ──► peer
//! │              │                │            │
//! │   inbound    │ ◄───────────── │ ChunkSender│ ◄── peer
//! └──────────────┘  (id, chunk)   └────────────┘
//! ```
//!
//! Inbound chunks go through a [`ChunkSender`], a cloneable handle onto the
//! engine's unbounded channel tagged with the transport's id. Chunks are
//! buffered until the next tick drains them.

mod memory;
mod renderer;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crossbeam_channel::Sender;
use tessera_shared::CrdtMessage;

use crate::error::{TransportError, TransportResult};

pub use memory::MemoryTransport;
pub use renderer::{HostBridge, RendererTransport};

/// Boxed `Send` future returned by transport and host calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stable index of a transport inside the replication engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(pub usize);

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Inbound hook handed to a transport on attach.
#[derive(Clone, Debug)]
pub struct ChunkSender {
    transport: TransportId,
    tx: Sender<(TransportId, Vec<u8>)>,
}

impl ChunkSender {
    pub(crate) const fn new(transport: TransportId, tx: Sender<(TransportId, Vec<u8>)>) -> Self {
        Self { transport, tx }
    }

    /// Queues a received chunk for the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the engine has been dropped.
    pub fn send(&self, chunk: Vec<u8>) -> TransportResult<()> {
        self.tx
            .send((self.transport, chunk))
            .map_err(|_| TransportError::Closed)
    }

    /// The transport this hook belongs to.
    #[inline]
    #[must_use]
    pub const fn transport_id(&self) -> TransportId {
        self.transport
    }
}

/// What a transport filter gets to look at.
#[derive(Clone, Copy, Debug)]
pub struct TransportMessage<'a> {
    /// The outgoing message.
    pub message: &'a CrdtMessage,
    /// Where the message came from. `None` for local changes.
    pub transport_id: Option<TransportId>,
}

/// A replication peer.
pub trait Transport: Send {
    /// Delivers one tick's payload. Called every tick, even when empty.
    fn send(&mut self, payload: Vec<u8>) -> BoxFuture<'_, TransportResult<()>>;

    /// True if the message should be sent to this peer.
    fn filter(&self, message: &TransportMessage<'_>) -> bool;

    /// Installs the inbound hook.
    fn attach(&mut self, inbound: ChunkSender);

    /// Short label used in logs.
    fn kind(&self) -> &str;

    /// Feeds the peer's current state into the inbound hook.
    ///
    /// Returns the number of chunks queued.
    fn pull_initial_state(&mut self) -> BoxFuture<'_, TransportResult<usize>> {
        Box::pin(async { Ok(0) })
    }
}
