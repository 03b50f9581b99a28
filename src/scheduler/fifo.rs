use super::{Decision, Scheduler};
use crate::core::{
    Ticks,
    queue::ReadyQueue,
    state::{Pid, Process, ProcessTable},
};

/// First come, first served. Simultaneous arrivals reach `enqueue` in
/// ascending pid order, so plain FIFO order is enough.
#[derive(Debug)]
pub struct FcfsScheduler {
    ready: ReadyQueue,
}

impl FcfsScheduler {
    pub fn new() -> Self {
        Self {
            ready: ReadyQueue::new_fifo(),
        }
    }
}

impl Default for FcfsScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for FcfsScheduler {
    fn name(&self) -> &'static str {
        "fcfs"
    }

    fn enqueue(&mut self, process: &Process) {
        self.ready.push_back(process.pid);
    }

    fn decide(&mut self, _now: Ticks, _table: &ProcessTable) -> Decision {
        self.ready.pop().map_or(Decision::Idle, Decision::Dispatch)
    }

    fn len(&self) -> usize {
        self.ready.len()
    }

    fn queued(&self) -> Vec<Pid> {
        self.ready.ordered()
    }
}
