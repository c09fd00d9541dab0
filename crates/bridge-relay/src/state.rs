//! Run state and cooperative stop handle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mutable state of one engine run.
///
/// Owned exclusively by the engine's single task; discarded at run end and
/// never persisted. `bus_off_streak` counts *consecutive* recovery episodes:
/// it resets to zero on any successful receive on either channel, not on
/// `RecoverySucceeded`, so repeated bus-off events without an intervening
/// frame exhaust the budget even when each individual episode recovers.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub bus_off_streak: u32,
}

/// Cloneable handle that requests a running engine to stop.
///
/// `stop()` is idempotent and safe to call at any time, including before
/// `run()` starts. The engine observes the flag at the top of each loop
/// iteration, inside the send retry loop, and inside the recovery retry
/// loop, so stop latency is bounded by one poll timeout plus any in-flight
/// sleep.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub(crate) fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Request the engine to stop at the next loop iteration boundary
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the engine has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
