use std::sync::Arc;

use parking_lot::Mutex;

use super::driver::{RunState, Simulation, Snapshot, StepOutcome};
use crate::{core::EventSink, error::Result};

/// Cloneable handle that serializes control calls and steps from several
/// threads.
pub struct SimHandle<K: EventSink> {
    inner: Arc<Mutex<Simulation<K>>>,
}

impl<K: EventSink> Clone for SimHandle<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: EventSink> SimHandle<K> {
    pub fn new(sim: Simulation<K>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sim)),
        }
    }

    pub fn start(&self) -> Result<()> {
        self.inner.lock().start()
    }

    pub fn pause(&self) -> Result<()> {
        self.inner.lock().pause()
    }

    pub fn resume(&self) -> Result<()> {
        self.inner.lock().resume()
    }

    pub fn reset(&self) -> Result<()> {
        self.inner.lock().reset()
    }

    pub fn step(&self) -> Result<StepOutcome> {
        self.inner.lock().step()
    }

    /// Step only while the run is `Running`; `None` otherwise. This is what a
    /// pacing loop calls on every tick.
    pub fn step_if_running(&self) -> Result<Option<StepOutcome>> {
        let mut sim = self.inner.lock();
        if sim.state() != RunState::Running {
            return Ok(None);
        }
        sim.step().map(Some)
    }

    pub fn state(&self) -> RunState {
        self.inner.lock().state()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot()
    }

    /// Run `f` with exclusive access to the simulation.
    pub fn with<R>(&self, f: impl FnOnce(&mut Simulation<K>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<K: EventSink> std::fmt::Debug for SimHandle<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimHandle").finish_non_exhaustive()
    }
}
