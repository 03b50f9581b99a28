pub mod fifo;
pub mod priq;
pub mod round_robin;
pub mod sjf;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{
    Ticks,
    queue::QueueKey,
    state::{Pid, Process, ProcessTable},
};
pub use fifo::FcfsScheduler;
pub use priq::PriorityScheduler;
pub use round_robin::RoundRobinScheduler;
pub use sjf::SjfScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Dispatch(Pid),
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityOrder {
    #[default]
    LowerFirst,
    HigherFirst,
}

/// CPU scheduling discipline, resolved from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuPolicy {
    Fcfs,
    Sjf { preemptive: bool },
    Priority { preemptive: bool, order: PriorityOrder },
    RoundRobin { quantum: Ticks },
}

/// A scheduling discipline. Each implementation owns its ready queue; the
/// driver tells it when a process becomes ready and asks it what to run.
pub trait Scheduler: fmt::Debug {
    fn name(&self) -> &'static str;

    /// `process` has just become `Ready`.
    fn enqueue(&mut self, process: &Process);

    /// Pick the next process to run on an idle CPU. Must only return
    /// processes previously enqueued and not yet handed out.
    fn decide(&mut self, now: Ticks, table: &ProcessTable) -> Decision;

    /// Asked after every batch of enqueues while a process is running.
    fn should_preempt(&self, _running: &Process) -> bool {
        false
    }

    fn quantum(&self) -> Option<Ticks> {
        None
    }

    /// Number of processes waiting in the ready queue.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ready queue in service order, for snapshots.
    fn queued(&self) -> Vec<Pid>;
}

pub(crate) fn burst_key(process: &Process) -> QueueKey {
    QueueKey {
        rank: i64::try_from(process.remaining()).unwrap_or(i64::MAX),
        arrival: process.arrival,
        pid: process.pid,
    }
}

pub(crate) fn priority_key(process: &Process, order: PriorityOrder) -> QueueKey {
    let prio = i64::from(process.priority);
    QueueKey {
        rank: match order {
            PriorityOrder::LowerFirst => prio,
            PriorityOrder::HigherFirst => -prio,
        },
        arrival: process.arrival,
        pid: process.pid,
    }
}

/// The built-in disciplines, or one supplied by the caller, picked once at
/// setup.
#[derive(Debug)]
pub enum AnyScheduler {
    Fcfs(FcfsScheduler),
    Sjf(SjfScheduler),
    Priority(PriorityScheduler),
    RoundRobin(RoundRobinScheduler),
    /// A discipline supplied by the caller.
    Custom(Box<dyn Scheduler + Send>),
}

impl AnyScheduler {
    pub fn new(policy: CpuPolicy) -> Self {
        match policy {
            CpuPolicy::Fcfs => Self::Fcfs(FcfsScheduler::new()),
            CpuPolicy::Sjf { preemptive } => Self::Sjf(SjfScheduler::new(preemptive)),
            CpuPolicy::Priority { preemptive, order } => {
                Self::Priority(PriorityScheduler::new(preemptive, order))
            }
            CpuPolicy::RoundRobin { quantum } => {
                Self::RoundRobin(RoundRobinScheduler::new(quantum))
            }
        }
    }

    fn inner(&self) -> &dyn Scheduler {
        match self {
            Self::Fcfs(s) => s,
            Self::Sjf(s) => s,
            Self::Priority(s) => s,
            Self::RoundRobin(s) => s,
            Self::Custom(s) => s.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Scheduler {
        match self {
            Self::Fcfs(s) => s,
            Self::Sjf(s) => s,
            Self::Priority(s) => s,
            Self::RoundRobin(s) => s,
            Self::Custom(s) => s.as_mut(),
        }
    }
}

impl Scheduler for AnyScheduler {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn enqueue(&mut self, process: &Process) {
        self.inner_mut().enqueue(process);
    }

    fn decide(&mut self, now: Ticks, table: &ProcessTable) -> Decision {
        self.inner_mut().decide(now, table)
    }

    fn should_preempt(&self, running: &Process) -> bool {
        self.inner().should_preempt(running)
    }

    fn quantum(&self) -> Option<Ticks> {
        self.inner().quantum()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn queued(&self) -> Vec<Pid> {
        self.inner().queued()
    }
}
