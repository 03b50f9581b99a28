use super::{Decision, Scheduler, burst_key};
use crate::core::{
    Ticks,
    queue::ReadyQueue,
    state::{Pid, Process, ProcessTable},
};

/// Shortest job first on the remaining length of the current CPU burst. The
/// preemptive variant is shortest-remaining-time-first.
#[derive(Debug)]
pub struct SjfScheduler {
    ready: ReadyQueue,
    preemptive: bool,
}

impl SjfScheduler {
    pub fn new(preemptive: bool) -> Self {
        Self {
            ready: ReadyQueue::new_keyed(),
            preemptive,
        }
    }
}

impl Scheduler for SjfScheduler {
    fn name(&self) -> &'static str {
        if self.preemptive { "sjf-preemptive" } else { "sjf" }
    }

    fn enqueue(&mut self, process: &Process) {
        self.ready.push_keyed(burst_key(process));
    }

    fn decide(&mut self, _now: Ticks, _table: &ProcessTable) -> Decision {
        self.ready.pop().map_or(Decision::Idle, Decision::Dispatch)
    }

    // Ties keep the running process on the CPU
    fn should_preempt(&self, running: &Process) -> bool {
        self.preemptive
            && self
                .ready
                .peek_key()
                .is_some_and(|best| best.rank < burst_key(running).rank)
    }

    fn len(&self) -> usize {
        self.ready.len()
    }

    fn queued(&self) -> Vec<Pid> {
        self.ready.ordered()
    }
}
