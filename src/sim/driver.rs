use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    job::{ProcessDescriptor, validate_all},
    stats::{self, ProcessMetrics, Summary},
};
use crate::{
    config::{Policy, SimConfig, SimMode},
    core::{
        CpuCore, Event, EventSink, Pid, ProcessState, ProcessTable, StepStatus, Ticks, Trace,
    },
    error::{Result, SimError},
    memory::{Block, MemCore},
    scheduler::{AnyScheduler, Scheduler},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
    /// Stopped by an engine error; only `reset` leaves this state.
    Failed,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The clock moved to `time` and `events` new events were delivered.
    Advanced { time: Ticks, events: usize },
    Finished,
}

type MakeScheduler = Arc<dyn Fn() -> Box<dyn Scheduler + Send> + Send + Sync>;

// Builds a fresh caller-supplied scheduler for every run
#[derive(Clone)]
struct SchedulerFactory(MakeScheduler);

impl fmt::Debug for SchedulerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SchedulerFactory")
    }
}

#[derive(Debug)]
enum Engine {
    Cpu(CpuCore<AnyScheduler>),
    Memory(MemCore),
}

impl Engine {
    fn build(
        policy: Policy,
        config: &SimConfig,
        descriptors: &[ProcessDescriptor],
        custom: Option<&SchedulerFactory>,
    ) -> Result<Self> {
        let table = ProcessTable::new(descriptors)?;
        Ok(match policy {
            Policy::Cpu(cpu) => {
                let scheduler = match custom {
                    Some(make) => AnyScheduler::Custom((make.0)()),
                    None => AnyScheduler::new(cpu),
                };
                Self::Cpu(CpuCore::new(table, scheduler))
            }
            Policy::Memory(strategy) => Self::Memory(MemCore::new(
                table,
                strategy,
                config.memory_size,
                config.on_insufficient_memory,
            )),
        })
    }

    fn step(&mut self, trace: &mut Trace) -> Result<StepStatus> {
        match self {
            Self::Cpu(core) => core.step(trace),
            Self::Memory(core) => core.step(trace),
        }
    }

    fn now(&self) -> Ticks {
        match self {
            Self::Cpu(core) => core.now(),
            Self::Memory(core) => core.now(),
        }
    }

    fn next_boundary(&self) -> Option<Ticks> {
        match self {
            Self::Cpu(core) => core.next_boundary(),
            Self::Memory(core) => core.next_boundary(),
        }
    }

    fn table(&self) -> &ProcessTable {
        match self {
            Self::Cpu(core) => &core.table,
            Self::Memory(core) => &core.table,
        }
    }

    fn policy_name(&self) -> &'static str {
        match self {
            Self::Cpu(core) => core.scheduler.name(),
            Self::Memory(core) => core.strategy().name(),
        }
    }
}

/// State of one process as shown to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSnapshot {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
    pub arrival: Ticks,
    pub priority: i32,
    pub size: u64,
    pub remaining: Ticks,
    pub cpu_time: Ticks,
    pub wait_time: Ticks,
}

/// Full copy of the simulation state, for initial render and re-sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub time: Ticks,
    pub state: RunState,
    pub policy: &'static str,
    pub running: Option<Pid>,
    /// CPU ready queue, or memory wait queue, in service order.
    pub ready: Vec<Pid>,
    pub processes: Vec<ProcessSnapshot>,
    pub memory: Option<Vec<Block>>,
    pub events_emitted: usize,
}

/// One run of a workload under a policy, delivering its events to a sink.
// Idle -> Running -> {Paused, Completed, Failed}, Paused -> Running, and
// reset() returns any state to Idle.
#[derive(Debug)]
pub struct Simulation<K: EventSink> {
    config: SimConfig,
    policy: Policy,
    descriptors: Vec<ProcessDescriptor>,
    custom: Option<SchedulerFactory>,
    engine: Engine,
    trace: Trace,
    sink: K,
    state: RunState,
    failure: Option<SimError>,
}

impl<K: EventSink> Simulation<K> {
    pub fn new(config: SimConfig, descriptors: Vec<ProcessDescriptor>, sink: K) -> Result<Self> {
        let policy = config.resolve()?;
        Self::build(config, policy, descriptors, None, sink)
    }

    /// Run a CPU workload under a scheduler of the caller's own. `make` is
    /// called again on every reset.
    pub fn with_scheduler<S, F>(
        config: SimConfig,
        descriptors: Vec<ProcessDescriptor>,
        make: F,
        sink: K,
    ) -> Result<Self>
    where
        S: Scheduler + Send + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let policy = config.resolve()?;
        if policy.mode() != SimMode::Cpu {
            return Err(SimError::UnsupportedConfiguration(
                "a custom scheduler needs a CPU scheduling policy".to_string(),
            ));
        }
        let factory = SchedulerFactory(Arc::new(move || -> Box<dyn Scheduler + Send> {
            Box::new(make())
        }));
        Self::build(config, policy, descriptors, Some(factory), sink)
    }

    fn build(
        config: SimConfig,
        policy: Policy,
        descriptors: Vec<ProcessDescriptor>,
        custom: Option<SchedulerFactory>,
        sink: K,
    ) -> Result<Self> {
        validate_all(&descriptors, policy.mode())?;
        let engine = Engine::build(policy, &config, &descriptors, custom.as_ref())?;
        info!(
            policy = engine.policy_name(),
            processes = descriptors.len(),
            "simulation ready"
        );

        Ok(Self {
            config,
            policy,
            descriptors,
            custom,
            engine,
            trace: Trace::new(),
            sink,
            state: RunState::Idle,
            failure: None,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn now(&self) -> Ticks {
        self.engine.now()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn trace(&self) -> &[Event] {
        self.trace.events()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    fn set_state(&mut self, state: RunState) {
        if self.state != state {
            info!(from = self.state.as_str(), to = state.as_str(), now = self.now(), "run state");
            self.state = state;
        }
    }

    /// The error that stopped the run, if any.
    pub fn failure(&self) -> Option<&SimError> {
        self.failure.as_ref()
    }

    fn illegal(&self, action: &'static str) -> SimError {
        SimError::IllegalControl {
            action,
            state: self.state.as_str(),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            RunState::Idle | RunState::Paused => {
                self.set_state(RunState::Running);
                Ok(())
            }
            RunState::Running | RunState::Completed | RunState::Failed => {
                Err(self.illegal("start"))
            }
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            RunState::Running => {
                self.set_state(RunState::Paused);
                Ok(())
            }
            _ => Err(self.illegal("pause")),
        }
    }

    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            RunState::Paused => {
                self.set_state(RunState::Running);
                Ok(())
            }
            _ => Err(self.illegal("resume")),
        }
    }

    /// Advance to the next event boundary. Stepping an idle simulation starts
    /// it; stepping a paused one is a single step that stays paused.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        match self.state {
            RunState::Completed => return Ok(StepOutcome::Finished),
            RunState::Idle => self.set_state(RunState::Running),
            RunState::Running | RunState::Paused | RunState::Failed => {}
        }

        let result = self.engine.step(&mut self.trace);
        // Events emitted before a failure still reach the sink
        let events = self.deliver();
        let status = match result {
            Ok(status) => status,
            Err(error) => {
                if error.is_fatal() {
                    warn!(%error, now = self.now(), "simulation failed");
                    self.failure = Some(error.clone());
                    self.set_state(RunState::Failed);
                }
                return Err(error);
            }
        };

        debug!(now = self.now(), events, "step");
        if status == StepStatus::Finished {
            self.set_state(RunState::Completed);
        }
        if events == 0 && status == StepStatus::Finished {
            return Ok(StepOutcome::Finished);
        }
        Ok(StepOutcome::Advanced {
            time: self.now(),
            events,
        })
    }

    fn deliver(&mut self) -> usize {
        let batch = self.trace.take_undelivered();
        for event in batch {
            self.sink.on_event(event);
        }
        batch.len()
    }

    /// Process every boundary up to and including `time`. Returns the number
    /// of events delivered.
    pub fn advance_to(&mut self, time: Ticks) -> Result<usize> {
        let mut delivered = 0;
        while !self.is_completed() {
            match self.engine.next_boundary() {
                Some(next) if next <= time => {}
                // Nothing left to schedule: one more step settles completion
                None => {}
                Some(_) => break,
            }
            match self.step()? {
                StepOutcome::Advanced { events, .. } => delivered += events,
                StepOutcome::Finished => break,
            }
        }
        Ok(delivered)
    }

    pub fn run_to_completion(&mut self) -> Result<usize> {
        self.advance_to(Ticks::MAX)
    }

    /// Back to `Idle` at time zero with the original input. The trace is
    /// cleared; the sink is kept.
    pub fn reset(&mut self) -> Result<()> {
        self.engine = Engine::build(
            self.policy,
            &self.config,
            &self.descriptors,
            self.custom.as_ref(),
        )?;
        self.trace.clear();
        self.failure = None;
        self.set_state(RunState::Idle);
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        let processes = self
            .engine
            .table()
            .iter()
            .map(|p| ProcessSnapshot {
                pid: p.pid,
                name: p.name.clone(),
                state: p.state(),
                arrival: p.arrival,
                priority: p.priority,
                size: p.size,
                remaining: p.remaining(),
                cpu_time: p.cpu_time(),
                wait_time: p.wait_time(),
            })
            .collect();

        let (running, ready, memory) = match &self.engine {
            Engine::Cpu(core) => (core.running(), core.scheduler.queued(), None),
            Engine::Memory(core) => (None, core.waiting(), Some(core.map().blocks().to_vec())),
        };

        Snapshot {
            time: self.now(),
            state: self.state,
            policy: self.engine.policy_name(),
            running,
            ready,
            processes,
            memory,
            events_emitted: self.trace.len(),
        }
    }

    pub fn metrics(&self) -> Vec<ProcessMetrics> {
        stats::metrics(self.engine.table())
    }

    pub fn summary(&self) -> Summary {
        stats::summarize(&self.metrics(), self.now())
    }
}
