//! Execution environment abstraction.
//!
//! The MQTT client needs exactly three things from the platform it runs on:
//! a way to start its background task, a millisecond clock, and a way to
//! sleep. Everything else (the session mutex, the exit acknowledgment) is
//! built on the crate's own synchronization stack.
//!
//! A platform is handed to each client at construction time, so different
//! clients in one program can run on different executors, and tests can
//! substitute a manual clock.
//!
//! # Clock semantics
//!
//! [`Platform::now_ms`] returns a free-running `u32` millisecond counter. It
//! is expected to wrap (after roughly 49.7 days); the client only ever
//! compares timestamps with [`elapsed_ms`], which is wraparound-safe.

#![deny(unsafe_code)]

#[cfg(feature = "std")]
mod thread;

#[cfg(feature = "std")]
pub use thread::{StdPlatform, StdTask};

/// Error returned when the platform cannot start a task.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SpawnError;

#[cfg(feature = "defmt")]
impl defmt::Format for SpawnError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "SpawnError")
    }
}

/// Creation parameters for a background task.
///
/// `stack_size` and `priority` are hints; platforms without those knobs
/// ignore them.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TaskConfig {
    /// Human-readable task name.
    pub name: &'static str,
    /// Stack size in bytes.
    pub stack_size: usize,
    /// Scheduler priority; larger is more urgent.
    pub priority: u8,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: "mqtt-engine",
            stack_size: 2048,
            priority: 5,
        }
    }
}

/// A handle to a started task.
pub trait Task {
    /// Block until the task has returned and release its resources.
    fn join(self);
}

/// The services the client consumes from the execution environment.
pub trait Platform {
    /// The handle type returned by [`spawn`](Platform::spawn).
    type Task: Task;

    /// Start `entry` as a new task.
    fn spawn<F>(&self, config: TaskConfig, entry: F) -> Result<Self::Task, SpawnError>
    where
        F: FnOnce() + Send + 'static;

    /// Current monotonic time in milliseconds, wrapping at `u32::MAX`.
    fn now_ms(&self) -> u32;

    /// Suspend the calling task for `ms` milliseconds.
    fn sleep_ms(&self, ms: u32);
}

/// Milliseconds elapsed from `since` to `now` on a wrapping `u32` clock.
///
/// Correct as long as the real interval is shorter than one full wrap of the
/// counter.
///
/// ```rust
/// use libmqtt::os::elapsed_ms;
///
/// assert_eq!(elapsed_ms(1_500, 1_000), 500);
/// assert_eq!(elapsed_ms(99, u32::MAX - 100), 200);
/// ```
#[inline]
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}
