//! Single-flight guard for saves
//!
//! At most one save may be on the wire per adapter. A save that arrives
//! while another is outstanding is dropped, not queued. If an exchange never
//! settles, a safety timer releases the guard so saving is not blocked
//! forever.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Default)]
struct GuardState {
    in_flight: bool,
    /// Bumped on every accepted save
    generation: u64,
    safety_timer: Option<JoinHandle<()>>,
}

fn lock(state: &Mutex<GuardState>) -> MutexGuard<'_, GuardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-flight flag plus safety timer
#[derive(Debug, Clone)]
pub struct SaveGuard {
    state: Arc<Mutex<GuardState>>,
    safety_timeout: Duration,
}

impl SaveGuard {
    pub fn new(safety_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState::default())),
            safety_timeout,
        }
    }

    /// Whether a save is currently outstanding
    pub fn is_in_flight(&self) -> bool {
        lock(&self.state).in_flight
    }

    /// Mark a save as started and arm the safety timer on `runtime`.
    ///
    /// Returns `None` when a save is already outstanding.
    pub fn try_acquire(&self, runtime: &Handle) -> Option<SavePermit> {
        let mut state = lock(&self.state);
        if state.in_flight {
            return None;
        }

        state.in_flight = true;
        state.generation += 1;
        let generation = state.generation;

        let shared = Arc::clone(&self.state);
        let timeout = self.safety_timeout;
        state.safety_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut state = lock(&shared);
            if state.generation == generation && state.in_flight {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Save did not settle in time, releasing save guard"
                );
                state.in_flight = false;
                state.safety_timer = None;
            }
        }));

        Some(SavePermit {
            state: Arc::clone(&self.state),
            generation,
        })
    }
}

/// Held for the lifetime of one accepted save. Dropping it releases the
/// guard and cancels the safety timer.
#[derive(Debug)]
pub struct SavePermit {
    state: Arc<Mutex<GuardState>>,
    generation: u64,
}

impl Drop for SavePermit {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        // The safety timer already released us and a newer save owns the guard.
        if state.generation != self.generation {
            return;
        }
        state.in_flight = false;
        if let Some(timer) = state.safety_timer.take() {
            timer.abort();
        }
    }
}
