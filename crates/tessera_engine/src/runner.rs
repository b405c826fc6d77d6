//! # Scene Runner
//!
//! Drives an [`Engine`] at a fixed rate on the tokio clock.
//!
//! ```text
//! on_start():  pull initial state ──► update(0.0)
//! run_for(n):  every 1/target_fps  ──► update(min(elapsed, max_frame_dt))
//! ```

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::info;

use crate::engine::Engine;
use crate::error::EngineResult;

/// Fixed-rate driver for a scene engine.
#[derive(Debug)]
pub struct SceneRunner {
    engine: Engine,
    frames: u64,
    started: bool,
}

impl SceneRunner {
    /// Wraps an engine. The engine's config sets the tick rate.
    #[must_use]
    pub const fn new(engine: Engine) -> Self {
        Self {
            engine,
            frames: 0,
            started: false,
        }
    }

    /// The driven engine.
    #[inline]
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Mutable access to the driven engine.
    #[inline]
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Frames run so far, start-up frame included.
    #[inline]
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Unwraps the engine.
    #[must_use]
    pub fn into_engine(self) -> Engine {
        self.engine
    }

    /// Pulls the renderer state (if configured) and runs the first tick with
    /// `dt = 0`. Does nothing if already started.
    ///
    /// # Errors
    ///
    /// Propagates a failing system.
    pub async fn on_start(&mut self) -> EngineResult<()> {
        if self.started {
            return Ok(());
        }
        if self.engine.config().fetch_initial_state {
            let chunks = self.engine.pull_initial_state().await;
            info!(chunks, "initial state pulled");
        }
        self.engine.update(0.0).await?;
        self.started = true;
        self.frames += 1;
        Ok(())
    }

    /// Runs `frames` ticks at the configured rate, starting the scene first
    /// if needed.
    ///
    /// # Errors
    ///
    /// Stops at the first failing tick.
    pub async fn run_for(&mut self, frames: u64) -> EngineResult<()> {
        self.on_start().await?;

        let config = self.engine.config();
        let max_dt = config.max_frame_dt;
        let mut interval = time::interval(config.frame_duration());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately.
        interval.tick().await;

        let mut last = Instant::now();
        for _ in 0..frames {
            let now = interval.tick().await;
            let dt = now.duration_since(last).as_secs_f32().min(max_dt);
            last = now;
            self.engine.update(dt).await?;
            self.frames += 1;
        }
        Ok(())
    }
}
