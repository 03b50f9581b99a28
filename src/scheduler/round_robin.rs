use super::{Decision, Scheduler};
use crate::core::{
    Ticks,
    queue::ReadyQueue,
    state::{Pid, Process, ProcessTable},
};

#[derive(Debug)]
pub struct RoundRobinScheduler {
    ready: ReadyQueue,
    quantum: Ticks,
}

impl RoundRobinScheduler {
    pub fn new(quantum: Ticks) -> Self {
        assert!(quantum > 0, "Round-robin requires a positive quantum");
        Self {
            ready: ReadyQueue::new_fifo(),
            quantum,
        }
    }
}

impl Scheduler for RoundRobinScheduler {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    // Expired processes come back through here too, landing at the tail
    fn enqueue(&mut self, process: &Process) {
        self.ready.push_back(process.pid);
    }

    fn decide(&mut self, _now: Ticks, _table: &ProcessTable) -> Decision {
        self.ready.pop().map_or(Decision::Idle, Decision::Dispatch)
    }

    fn quantum(&self) -> Option<Ticks> {
        Some(self.quantum)
    }

    fn len(&self) -> usize {
        self.ready.len()
    }

    fn queued(&self) -> Vec<Pid> {
        self.ready.ordered()
    }
}
