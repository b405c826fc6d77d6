//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use tessera_engine::{
    BoxFuture, ChunkSender, Engine, EngineConfig, Transport, TransportMessage, TransportResult,
};
use tessera_shared::{read_message, ByteBuffer, CrdtMessage, MAX_STATIC_COMPONENT};

/// Transport that records every payload and lets the test inject chunks.
pub struct RecordingTransport {
    recording: Recording,
    static_only: bool,
}

/// Test-side view of a [`RecordingTransport`].
#[derive(Clone, Default)]
pub struct Recording {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    inbound: Arc<Mutex<Option<ChunkSender>>>,
}

pub fn recording() -> (RecordingTransport, Recording) {
    let recording = Recording::default();
    (
        RecordingTransport {
            recording: recording.clone(),
            static_only: false,
        },
        recording,
    )
}

/// Like [`recording`], but the transport only admits static components and
/// entity deletions.
pub fn static_recording() -> (RecordingTransport, Recording) {
    let (mut transport, recording) = recording();
    transport.static_only = true;
    (transport, recording)
}

impl Transport for RecordingTransport {
    fn send(&mut self, payload: Vec<u8>) -> BoxFuture<'_, TransportResult<()>> {
        self.recording.sent.lock().push(payload);
        Box::pin(async { Ok(()) })
    }

    fn filter(&self, message: &TransportMessage<'_>) -> bool {
        if !self.static_only {
            return true;
        }
        match message.message {
            CrdtMessage::DeleteEntity(_) => true,
            other => other
                .component_id()
                .is_some_and(|id| id.0 < MAX_STATIC_COMPONENT),
        }
    }

    fn attach(&mut self, inbound: ChunkSender) {
        *self.recording.inbound.lock() = Some(inbound);
    }

    fn kind(&self) -> &str {
        "recording"
    }
}

impl Recording {
    /// Delivers the messages to the engine as one chunk.
    pub fn push(&self, messages: &[CrdtMessage]) {
        let mut buf = ByteBuffer::new();
        for message in messages {
            message.write_to(&mut buf);
        }
        self.push_raw(buf.into_vec());
    }

    /// Delivers raw bytes to the engine.
    pub fn push_raw(&self, chunk: Vec<u8>) {
        self.inbound
            .lock()
            .as_ref()
            .expect("transport not attached")
            .send(chunk)
            .expect("engine dropped");
    }

    /// Number of payloads sent so far.
    pub fn payload_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Decoded messages of the most recent payload.
    pub fn last(&self) -> Vec<CrdtMessage> {
        self.sent.lock().last().map(|p| decode(p)).unwrap_or_default()
    }
}

/// Decodes every message in a payload.
pub fn decode(payload: &[u8]) -> Vec<CrdtMessage> {
    let mut buf = ByteBuffer::from_bytes(payload.to_vec());
    let mut messages = Vec::new();
    while let Some(frame) = read_message(&mut buf).expect("valid payload") {
        messages.push(frame.message);
    }
    messages
}

pub fn engine() -> Engine {
    Engine::new(EngineConfig {
        fetch_initial_state: false,
        ..EngineConfig::default()
    })
}
