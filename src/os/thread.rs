//! [`Platform`] backed by `std::thread` and `std::time::Instant`.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{Platform, SpawnError, Task, TaskConfig};

/// Runs the background task on an OS thread.
///
/// The stack size hint is raised to at least 64 KiB. Priority is ignored.
#[derive(Debug, Clone, Copy)]
pub struct StdPlatform {
    epoch: Instant,
}

const MIN_STACK: usize = 64 * 1024;

impl StdPlatform {
    /// Create a platform whose clock starts at zero now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdPlatform {
    fn default() -> Self {
        Self::new()
    }
}

/// Join handle of a task started by [`StdPlatform`].
#[derive(Debug)]
pub struct StdTask(JoinHandle<()>);

impl Task for StdTask {
    fn join(self) {
        if self.0.join().is_err() {
            log::warn!("os: background task panicked");
        }
    }
}

impl Platform for StdPlatform {
    type Task = StdTask;

    fn spawn<F>(&self, config: TaskConfig, entry: F) -> Result<Self::Task, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new()
            .name(config.name.into())
            .stack_size(config.stack_size.max(MIN_STACK))
            .spawn(entry)
            .map(StdTask)
            .map_err(|e| {
                log::warn!("os: failed to spawn {}: {}", config.name, e);
                SpawnError
            })
    }

    fn now_ms(&self) -> u32 {
        // Truncation is the wrap.
        self.epoch.elapsed().as_millis() as u32
    }

    fn sleep_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}
