//! Priority-ordered system scheduling.

use tessera_core::World;

use crate::error::{EngineError, EngineResult};

/// Priority given to systems added without an explicit one.
pub const SYSTEMS_REGULAR_PRIORITY: i32 = 100_000;

/// A per-tick callback over the world.
///
/// Systems are synchronous. Background work goes through the task queue.
pub trait System: Send {
    /// Runs one tick. `dt` is the elapsed time in seconds.
    ///
    /// # Errors
    ///
    /// Any error aborts the current tick.
    fn run(&mut self, world: &mut World, dt: f32) -> EngineResult<()>;
}

impl<F> System for F
where
    F: FnMut(&mut World, f32) -> EngineResult<()> + Send,
{
    fn run(&mut self, world: &mut World, dt: f32) -> EngineResult<()> {
        self(world, dt)
    }
}

struct SystemItem {
    name: String,
    priority: i32,
    system: Box<dyn System>,
}

/// Named systems sorted by descending priority.
///
/// Systems with equal priority run in insertion order.
#[derive(Default)]
pub struct SystemContainer {
    systems: Vec<SystemItem>,
}

impl SystemContainer {
    /// Creates an empty container.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Adds a named system.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateSystem`] if the name is taken.
    pub fn add(
        &mut self,
        system: impl System + 'static,
        priority: i32,
        name: impl Into<String>,
    ) -> EngineResult<()> {
        let name = name.into();
        if self.systems.iter().any(|s| s.name == name) {
            return Err(EngineError::DuplicateSystem(name));
        }
        let slot = self.systems.partition_point(|s| s.priority >= priority);
        self.systems.insert(
            slot,
            SystemItem {
                name,
                priority,
                system: Box::new(system),
            },
        );
        Ok(())
    }

    /// Removes a system by name. Returns false if there was none.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.systems.len();
        self.systems.retain(|s| s.name != name);
        self.systems.len() != before
    }

    /// Runs every system once, highest priority first.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system and returns its error.
    pub fn run(&mut self, world: &mut World, dt: f32) -> EngineResult<()> {
        for item in &mut self.systems {
            item.system.run(world, dt)?;
        }
        Ok(())
    }

    /// System names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.systems.iter().map(|s| s.name.as_str())
    }

    /// Number of systems.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// True if no system is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl std::fmt::Debug for SystemContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
