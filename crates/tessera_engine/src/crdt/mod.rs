//! # CRDT Replication
//!
//! Moves component state between the local [`World`] and every attached
//! transport, once per tick.
//!
//! ## Tick Phases
//!
//! ```text
//!  inbound chunks ──► receive_messages ──► systems ──► send_messages ──► transports
//!                        │                                  ▲
//!                        ├─ accepted ──► broadcast ─────────┤
//!                        └─ rejected ──► corrections ───────┘ (back to sender)
//! ```
//!
//! ## Rules
//!
//! - DELETE_ENTITY is applied after every other message of the batch
//! - Messages for removed entities are dropped
//! - Messages for unregistered components are relayed untouched
//! - A peer never receives its own messages back
//! - A correction is skipped if the same slot is broadcast in the same tick

use crossbeam_channel::{Receiver, Sender};
use tessera_core::{EntityState, World};
use tessera_shared::{
    read_message, ByteBuffer, ComponentId, CrdtMessage, CrdtMessageType, Entity, Frame,
};
use tracing::{debug, trace, warn};

use crate::transport::{ChunkSender, Transport, TransportId, TransportMessage};

/// A state change observed by the replication engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeEvent<'a> {
    /// Affected entity.
    pub entity: Entity,
    /// Operation that caused the change.
    pub operation: CrdtMessageType,
    /// Affected component, absent for entity deletions.
    pub component_id: Option<ComponentId>,
    /// Serialized value after the change.
    pub data: Option<&'a [u8]>,
}

/// Callback invoked for every applied change.
pub type ChangeCallback = Box<dyn FnMut(&ChangeEvent<'_>) + Send>;

/// An encoded message waiting to be sent.
#[derive(Debug)]
struct OutgoingMessage {
    message: CrdtMessage,
    bytes: Vec<u8>,
    origin: Option<TransportId>,
}

impl OutgoingMessage {
    fn local(message: CrdtMessage) -> Self {
        Self {
            bytes: message.to_bytes(),
            message,
            origin: None,
        }
    }
}

/// Replication engine.
pub struct CrdtSystem {
    transports: Vec<Box<dyn Transport>>,
    inbound_tx: Sender<(TransportId, Vec<u8>)>,
    inbound_rx: Receiver<(TransportId, Vec<u8>)>,
    broadcast: Vec<OutgoingMessage>,
    outdated: Vec<OutgoingMessage>,
    on_change: Option<ChangeCallback>,
    log_messages: bool,
}

impl CrdtSystem {
    /// Creates an engine with no transports.
    #[must_use]
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded();
        Self {
            transports: Vec::new(),
            inbound_tx,
            inbound_rx,
            broadcast: Vec::new(),
            outdated: Vec::new(),
            on_change: None,
            log_messages: false,
        }
    }

    /// Enables per-message debug logging.
    pub fn set_log_messages(&mut self, enabled: bool) {
        self.log_messages = enabled;
    }

    /// Installs the change callback, replacing any previous one.
    pub fn set_on_change(&mut self, callback: ChangeCallback) {
        self.on_change = Some(callback);
    }

    /// Registers a transport and hands it its inbound hook.
    pub fn add_transport(&mut self, mut transport: Box<dyn Transport>) -> TransportId {
        let id = TransportId(self.transports.len());
        transport.attach(self.chunk_sender(id));
        debug!(transport = %id, kind = transport.kind(), "transport added");
        self.transports.push(transport);
        id
    }

    /// A new inbound hook for the given transport id.
    #[must_use]
    pub fn chunk_sender(&self, id: TransportId) -> ChunkSender {
        ChunkSender::new(id, self.inbound_tx.clone())
    }

    /// Number of attached transports.
    #[inline]
    #[must_use]
    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    /// Mutable access to an attached transport.
    pub fn transport_mut(&mut self, id: TransportId) -> Option<&mut (dyn Transport + 'static)> {
        self.transports.get_mut(id.0).map(|t| &mut **t)
    }

    /// Chunks received but not yet processed.
    #[inline]
    #[must_use]
    pub fn pending_chunks(&self) -> usize {
        self.inbound_rx.len()
    }

    /// Asks every transport to feed its peer's state into the inbound queue.
    ///
    /// Returns the number of chunks queued. Failures are logged per
    /// transport.
    pub async fn pull_initial_state(&mut self) -> usize {
        let mut total = 0;
        for (index, transport) in self.transports.iter_mut().enumerate() {
            match transport.pull_initial_state().await {
                Ok(count) => total += count,
                Err(err) => warn!(
                    transport = %TransportId(index),
                    kind = transport.kind(),
                    error = %err,
                    "failed to pull initial state"
                ),
            }
        }
        total
    }

    // =========================================================================
    // Receive
    // =========================================================================

    fn drain_inbound(&self) -> Vec<(TransportId, Frame)> {
        let mut frames = Vec::new();
        for (origin, chunk) in self.inbound_rx.try_iter() {
            let mut buf = ByteBuffer::from_bytes(chunk);
            loop {
                match read_message(&mut buf) {
                    Ok(Some(frame)) => frames.push((origin, frame)),
                    Ok(None) => break,
                    Err(err) => warn!(
                        transport = %origin,
                        error = %err,
                        "skipping malformed crdt message"
                    ),
                }
            }
        }
        frames
    }

    /// Applies every queued inbound message to the world.
    ///
    /// Returns the number of messages processed.
    pub fn receive_messages(&mut self, world: &mut World) -> usize {
        let frames = self.drain_inbound();
        let processed = frames.len();
        let mut deleted = Vec::new();

        for (origin, Frame { message, raw }) in frames {
            if self.log_messages {
                debug!(transport = %origin, ?message, "received");
            }

            if let CrdtMessage::DeleteEntity(delete) = &message {
                deleted.push(delete.entity);
                self.broadcast.push(OutgoingMessage {
                    message,
                    bytes: raw,
                    origin: Some(origin),
                });
                continue;
            }

            let entity = message.entity();
            match world.entity_state(entity) {
                EntityState::Removed => {
                    trace!(%entity, "dropping message for removed entity");
                    continue;
                }
                EntityState::Unknown => {
                    world.entity_container_mut().update_used_entity(entity);
                }
                EntityState::UsedEntity | EntityState::Reserved => {}
            }

            let Some(component) = message
                .component_id()
                .and_then(|id| world.get_component_or_null_mut(id))
            else {
                self.broadcast.push(OutgoingMessage {
                    message,
                    bytes: raw,
                    origin: Some(origin),
                });
                continue;
            };

            let update = component.update_from_crdt(&message);
            if update.rejected {
                trace!(transport = %origin, %entity, "not relaying rejected message");
                continue;
            }
            if let Some(correction) = update.conflict {
                self.outdated.push(OutgoingMessage {
                    bytes: correction.to_bytes(),
                    message: correction,
                    origin: Some(origin),
                });
                continue;
            }

            self.emit(&ChangeEvent {
                entity,
                operation: message.message_type(),
                component_id: message.component_id(),
                data: update.data.as_deref(),
            });
            self.broadcast.push(OutgoingMessage {
                message,
                bytes: raw,
                origin: Some(origin),
            });
        }

        for entity in deleted {
            self.outdated.retain(|m| {
                m.message.entity() != entity || matches!(m.message, CrdtMessage::DeleteEntity(_))
            });
            for component in world.components_mut() {
                component.entity_deleted(entity, false);
            }
            world.entity_container_mut().update_removed_entity(entity);
            self.emit(&ChangeEvent {
                entity,
                operation: CrdtMessageType::DeleteEntity,
                component_id: None,
                data: None,
            });
        }

        processed
    }

    // =========================================================================
    // Send
    // =========================================================================

    /// Drains local changes and flushes one payload to every transport.
    ///
    /// Every transport is sent a payload, possibly empty. A failing transport
    /// is logged and does not stop the others.
    pub async fn send_messages(&mut self, world: &mut World, deleted_this_tick: &[Entity]) {
        let mut messages = std::mem::take(&mut self.broadcast);
        let outdated = std::mem::take(&mut self.outdated);

        for component in world.components_mut() {
            for message in component.crdt_updates() {
                let candidate = TransportMessage {
                    message: &message,
                    transport_id: None,
                };
                if !self.transports.iter().any(|t| t.filter(&candidate)) {
                    continue;
                }
                self.emit(&ChangeEvent {
                    entity: message.entity(),
                    operation: message.message_type(),
                    component_id: message.component_id(),
                    data: message.data(),
                });
                messages.push(OutgoingMessage::local(message));
            }
        }

        for &entity in deleted_this_tick {
            self.emit(&ChangeEvent {
                entity,
                operation: CrdtMessageType::DeleteEntity,
                component_id: None,
                data: None,
            });
            messages.push(OutgoingMessage::local(CrdtMessage::delete_entity(entity)));
        }

        for (index, transport) in self.transports.iter_mut().enumerate() {
            let id = TransportId(index);
            let mut buf = ByteBuffer::new();

            for correction in outdated.iter().filter(|m| m.origin == Some(id)) {
                let superseded = messages
                    .iter()
                    .any(|m| m.message.same_target(&correction.message));
                if !superseded {
                    buf.write_bytes(&correction.bytes, false);
                }
            }

            for outgoing in messages.iter().filter(|m| m.origin != Some(id)) {
                let view = TransportMessage {
                    message: &outgoing.message,
                    transport_id: outgoing.origin,
                };
                if transport.filter(&view) {
                    if self.log_messages {
                        debug!(transport = %id, message = ?outgoing.message, "sending");
                    }
                    buf.write_bytes(&outgoing.bytes, false);
                }
            }

            if let Err(err) = transport.send(buf.into_vec()).await {
                warn!(
                    transport = %id,
                    kind = transport.kind(),
                    error = %err,
                    "failed to send crdt payload"
                );
            }
        }
    }

    fn emit(&mut self, event: &ChangeEvent<'_>) {
        if let Some(callback) = self.on_change.as_mut() {
            callback(event);
        }
    }
}

impl Default for CrdtSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CrdtSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrdtSystem")
            .field("transports", &self.transports.len())
            .field("pending_chunks", &self.inbound_rx.len())
            .field("broadcast", &self.broadcast.len())
            .field("outdated", &self.outdated.len())
            .finish_non_exhaustive()
    }
}
