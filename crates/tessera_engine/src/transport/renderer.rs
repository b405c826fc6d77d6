//! # Renderer Transport
//!
//! Bridges the engine to the host renderer. Each tick's payload is handed to
//! the host; whatever chunks the host answers with are fed straight back into
//! the engine's inbound queue.
//!
//! Only static components (ids below [`MAX_STATIC_COMPONENT`]) and entity
//! deletions are of interest to the renderer. Scene-defined components stay
//! local.

use tessera_shared::{CrdtMessage, MAX_STATIC_COMPONENT};
use tracing::{debug, warn};

use super::{BoxFuture, ChunkSender, Transport, TransportMessage};
use crate::error::{TransportError, TransportResult};

/// Host-side calls a renderer transport relies on.
pub trait HostBridge: Send {
    /// Delivers a payload to the renderer. Returns the renderer's reply
    /// chunks.
    fn send_to_renderer(&mut self, payload: Vec<u8>) -> BoxFuture<'_, TransportResult<Vec<Vec<u8>>>>;

    /// Returns the renderer's current state as CRDT chunks.
    fn get_state(&mut self) -> BoxFuture<'_, TransportResult<Vec<Vec<u8>>>>;
}

/// Transport backed by a [`HostBridge`].
#[derive(Debug)]
pub struct RendererTransport<B> {
    bridge: B,
    inbound: Option<ChunkSender>,
}

impl<B: HostBridge> RendererTransport<B> {
    /// Wraps a host bridge.
    #[must_use]
    pub const fn new(bridge: B) -> Self {
        Self {
            bridge,
            inbound: None,
        }
    }

    /// The wrapped bridge.
    #[inline]
    #[must_use]
    pub const fn bridge(&self) -> &B {
        &self.bridge
    }

    fn forward(&self, chunks: Vec<Vec<u8>>) -> TransportResult<usize> {
        let Some(inbound) = &self.inbound else {
            if !chunks.is_empty() {
                warn!(chunks = chunks.len(), "renderer replied before attach, dropping");
            }
            return Ok(0);
        };
        let count = chunks.len();
        for chunk in chunks {
            inbound.send(chunk)?;
        }
        Ok(count)
    }
}

impl<B: HostBridge> Transport for RendererTransport<B> {
    fn send(&mut self, payload: Vec<u8>) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let reply = self.bridge.send_to_renderer(payload).await?;
            self.forward(reply).map(|_| ())
        })
    }

    fn filter(&self, message: &TransportMessage<'_>) -> bool {
        match message.message {
            CrdtMessage::DeleteEntity(_) => true,
            other => other
                .component_id()
                .is_some_and(|id| id.0 < MAX_STATIC_COMPONENT),
        }
    }

    fn attach(&mut self, inbound: ChunkSender) {
        self.inbound = Some(inbound);
    }

    fn kind(&self) -> &str {
        "renderer"
    }

    fn pull_initial_state(&mut self) -> BoxFuture<'_, TransportResult<usize>> {
        Box::pin(async move {
            if self.inbound.is_none() {
                return Err(TransportError::Closed);
            }
            let chunks = self.bridge.get_state().await?;
            let count = self.forward(chunks)?;
            debug!(chunks = count, "pulled renderer state");
            Ok(count)
        })
    }
}
