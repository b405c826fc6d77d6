//! In-process transport pair. Whatever one end sends, the other end receives
//! on its next tick.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{BoxFuture, ChunkSender, Transport, TransportMessage};
use crate::error::{TransportError, TransportResult};

type Slot = Arc<Mutex<Option<ChunkSender>>>;

/// One end of an in-process link.
#[derive(Debug)]
pub struct MemoryTransport {
    own: Slot,
    peer: Slot,
}

impl MemoryTransport {
    /// Creates two transports wired to each other.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let a: Slot = Arc::default();
        let b: Slot = Arc::default();
        (
            Self {
                own: Arc::clone(&a),
                peer: Arc::clone(&b),
            },
            Self { own: b, peer: a },
        )
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, payload: Vec<u8>) -> BoxFuture<'_, TransportResult<()>> {
        let result = if payload.is_empty() {
            Ok(())
        } else {
            match self.peer.lock().as_ref() {
                Some(peer) => peer.send(payload),
                None => Err(TransportError::Closed),
            }
        };
        Box::pin(async move { result })
    }

    fn filter(&self, _message: &TransportMessage<'_>) -> bool {
        true
    }

    fn attach(&mut self, inbound: ChunkSender) {
        *self.own.lock() = Some(inbound);
    }

    fn kind(&self) -> &str {
        "memory"
    }
}
