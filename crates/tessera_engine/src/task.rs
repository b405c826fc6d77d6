//! # Background Tasks
//!
//! Systems are synchronous, so anything that needs to await (host calls,
//! timers) is queued as a task instead. A regular-priority system drains the
//! queue every tick and spawns each task on the ambient tokio runtime.
//!
//! A failing task is logged and never reaches the tick loop.

use crossbeam_channel::{Receiver, Sender};
use tessera_core::World;
use tracing::error;

use crate::engine::{Engine, SYSTEMS_REGULAR_PRIORITY};
use crate::error::{EngineError, EngineResult};
use crate::transport::BoxFuture;

/// Name of the system that spawns queued tasks.
pub const TASK_SYSTEM_NAME: &str = "tessera::tasks";

type Task = BoxFuture<'static, EngineResult<()>>;

/// Cloneable handle for queueing tasks.
#[derive(Clone, Debug)]
pub struct TaskQueue {
    tx: Sender<Task>,
}

impl TaskQueue {
    /// Queues a task. It is spawned on the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Task`] if the engine is gone.
    pub fn execute_task<F>(&self, task: F) -> EngineResult<()>
    where
        F: std::future::Future<Output = EngineResult<()>> + Send + 'static,
    {
        self.tx
            .send(Box::pin(task))
            .map_err(|_| EngineError::Task("task queue closed".into()))
    }
}

fn spawn_pending(tasks: &Receiver<Task>) {
    for task in tasks.try_iter() {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!("no async runtime, dropping task");
            continue;
        };
        handle.spawn(async move {
            if let Err(err) = task.await {
                error!(error = %err, "task failed");
            }
        });
    }
}

/// Installs the task system and returns its queue.
///
/// # Errors
///
/// Fails if the task system is already installed.
pub fn register_task_system(engine: &mut Engine) -> EngineResult<TaskQueue> {
    let (tx, rx) = crossbeam_channel::unbounded::<Task>();
    engine.add_system(
        move |_: &mut World, _: f32| -> EngineResult<()> {
            spawn_pending(&rx);
            Ok(())
        },
        SYSTEMS_REGULAR_PRIORITY,
        TASK_SYSTEM_NAME,
    )?;
    Ok(TaskQueue { tx })
}
