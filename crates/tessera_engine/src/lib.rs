//! # TESSERA Engine - Scene Runtime
//!
//! Runs a scene's world one tick at a time and keeps it in sync with every
//! attached peer through CRDT messages.
//!
//! ## Architecture Rules
//!
//! 1. **Ticks are atomic** - receive, systems, release, send; never interleaved
//! 2. **Peers are transports** - the renderer is just another peer
//! 3. **Systems are synchronous** - async work goes through the task queue
//!
//! ## Example
//!
//! ```rust
//! use tessera_engine::{Engine, EngineConfig, MemoryTransport};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let (left, right) = MemoryTransport::pair();
//! let mut a = Engine::new(EngineConfig::default());
//! let mut b = Engine::new(EngineConfig::default());
//! a.add_transport(left);
//! b.add_transport(right);
//!
//! let health_a = a.world_mut().define_component::<u32>("my-scene::Health").unwrap();
//! let health_b = b.world_mut().define_component::<u32>("my-scene::Health").unwrap();
//!
//! let entity = a.add_entity().unwrap();
//! a.world_mut().component_mut(health_a).unwrap().create(entity, 100).unwrap();
//!
//! a.update(0.0).await.unwrap();
//! b.update(0.0).await.unwrap();
//! assert_eq!(b.world().component(health_b).unwrap().get(entity), Some(&100));
//! # });
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod crdt;
pub mod engine;
pub mod error;
pub mod input;
pub mod runner;
pub mod task;
pub mod transport;

pub use config::EngineConfig;
pub use crdt::{ChangeCallback, ChangeEvent, CrdtSystem};
pub use engine::{Engine, System, SystemContainer, SYSTEMS_REGULAR_PRIORITY};
pub use error::{EngineError, EngineResult, TransportError, TransportResult};
pub use input::{
    register_input_system, InputHandle, InputState, PointerEventResult, PointerEventType,
    INPUT_SYSTEM_PRIORITY, POINTER_EVENTS_RESULT,
};
pub use runner::SceneRunner;
pub use task::{register_task_system, TaskQueue};
pub use transport::{
    BoxFuture, ChunkSender, HostBridge, MemoryTransport, RendererTransport, Transport,
    TransportId, TransportMessage,
};
