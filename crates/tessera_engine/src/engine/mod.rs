//! # Scene Engine
//!
//! Owns the world, the systems and the replication engine, and runs one tick
//! at a time.
//!
//! ## Tick
//!
//! ```text
//! update(dt):
//!   1. crdt.receive_messages(world)     apply remote state
//!   2. systems.run(world, dt)           highest priority first
//!   3. world.release_removed_entities() flush removals
//!   4. crdt.send_messages(world, ..)    ship local diffs
//! ```
//!
//! Ticks never overlap: `update` takes `&mut self`.

mod system;

pub use system::{System, SystemContainer, SYSTEMS_REGULAR_PRIORITY};

use tessera_core::World;
use tessera_shared::{ByteBuffer, Entity};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::crdt::{ChangeEvent, CrdtSystem};
use crate::error::EngineResult;
use crate::transport::{Transport, TransportId};

/// A scene's runtime: world, systems and replication.
#[derive(Debug)]
pub struct Engine {
    world: World,
    systems: SystemContainer,
    crdt: CrdtSystem,
    config: EngineConfig,
    tick: u64,
}

impl Engine {
    /// Creates an engine with an empty world.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let mut crdt = CrdtSystem::new();
        crdt.set_log_messages(config.log_messages);
        info!(target_fps = config.target_fps, "engine created");
        Self {
            world: World::new(),
            systems: SystemContainer::new(),
            crdt,
            config,
            tick: 0,
        }
    }

    /// The world.
    #[inline]
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The configuration the engine was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ticks completed so far.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// The replication engine.
    #[inline]
    #[must_use]
    pub const fn crdt(&self) -> &CrdtSystem {
        &self.crdt
    }

    /// Mutable access to the replication engine.
    #[inline]
    pub fn crdt_mut(&mut self) -> &mut CrdtSystem {
        &mut self.crdt
    }

    /// Adds a named system.
    ///
    /// # Errors
    ///
    /// Fails if a system with that name already exists.
    pub fn add_system(
        &mut self,
        system: impl System + 'static,
        priority: i32,
        name: impl Into<String>,
    ) -> EngineResult<()> {
        self.systems.add(system, priority, name)
    }

    /// Removes a system by name.
    pub fn remove_system(&mut self, name: &str) -> bool {
        self.systems.remove(name)
    }

    /// The scheduled systems.
    #[inline]
    #[must_use]
    pub const fn systems(&self) -> &SystemContainer {
        &self.systems
    }

    /// Attaches a replication peer.
    pub fn add_transport(&mut self, transport: impl Transport + 'static) -> TransportId {
        self.crdt.add_transport(Box::new(transport))
    }

    /// Installs the change callback.
    pub fn on_change(&mut self, callback: impl FnMut(&ChangeEvent<'_>) + Send + 'static) {
        self.crdt.set_on_change(Box::new(callback));
    }

    /// Freezes the component registry.
    pub fn seal(&mut self) {
        self.world.seal();
    }

    /// Allocates a new entity.
    ///
    /// # Errors
    ///
    /// Fails when the entity range is exhausted.
    pub fn add_entity(&mut self) -> EngineResult<Entity> {
        Ok(self.world.add_entity()?)
    }

    /// Removes an entity. See [`World::remove_entity`].
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        self.world.remove_entity(entity)
    }

    /// Writes the full state of every component as CRDT messages.
    #[must_use]
    pub fn crdt_state(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::new();
        for component in self.world.components() {
            component.dump_crdt_state_to_buffer(&mut buf, &|_| true);
        }
        buf.into_vec()
    }

    /// Pulls every transport's initial state into the inbound queue.
    pub async fn pull_initial_state(&mut self) -> usize {
        self.crdt.pull_initial_state().await
    }

    /// Runs one tick.
    ///
    /// # Errors
    ///
    /// A failing system aborts the tick before anything is sent.
    pub async fn update(&mut self, dt: f32) -> EngineResult<()> {
        let received = self.crdt.receive_messages(&mut self.world);

        self.systems.run(&mut self.world, dt)?;

        let deleted = self.world.release_removed_entities();
        self.crdt.send_messages(&mut self.world, &deleted).await;

        self.tick += 1;
        if received > 0 || !deleted.is_empty() {
            debug!(
                tick = self.tick,
                received,
                deleted = deleted.len(),
                "tick complete"
            );
        }
        Ok(())
    }
}
