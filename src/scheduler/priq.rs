use super::{Decision, PriorityOrder, Scheduler, priority_key};
use crate::core::{
    Ticks,
    queue::ReadyQueue,
    state::{Pid, Process, ProcessTable},
};

#[derive(Debug)]
pub struct PriorityScheduler {
    ready: ReadyQueue,
    preemptive: bool,
    order: PriorityOrder,
}

impl PriorityScheduler {
    pub fn new(preemptive: bool, order: PriorityOrder) -> Self {
        Self {
            ready: ReadyQueue::new_keyed(),
            preemptive,
            order,
        }
    }
}

impl Scheduler for PriorityScheduler {
    fn name(&self) -> &'static str {
        if self.preemptive {
            "priority-preemptive"
        } else {
            "priority"
        }
    }

    fn enqueue(&mut self, process: &Process) {
        self.ready.push_keyed(priority_key(process, self.order));
    }

    fn decide(&mut self, _now: Ticks, _table: &ProcessTable) -> Decision {
        self.ready.pop().map_or(Decision::Idle, Decision::Dispatch)
    }

    // Only a strictly more urgent priority preempts; equal priorities wait
    fn should_preempt(&self, running: &Process) -> bool {
        self.preemptive
            && self
                .ready
                .peek_key()
                .is_some_and(|best| best.rank < priority_key(running, self.order).rank)
    }

    fn len(&self) -> usize {
        self.ready.len()
    }

    fn queued(&self) -> Vec<Pid> {
        self.ready.ordered()
    }
}
