use tracing::debug;

use super::{
    event::{EventKind, PreemptReason, Trace},
    observer::Observer,
    state::{Burst, Pid, ProcessState, ProcessTable, Ticks},
};
use crate::{
    error::{Result, SimError},
    scheduler::{Decision, Scheduler},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Progressed,
    Finished,
}

/// Single-CPU scheduling engine, stepped from one boundary to the next.
#[derive(Debug)]
pub struct CpuCore<S: Scheduler> {
    pub table: ProcessTable,
    pub scheduler: S,
    now: Ticks,
    running: Option<Pid>,
    arrival_cursor: usize,
    idle_reported: bool,
    observer: Observer,
}

impl<S: Scheduler> CpuCore<S> {
    pub fn new(table: ProcessTable, scheduler: S) -> Self {
        Self {
            table,
            scheduler,
            now: 0,
            running: None,
            arrival_cursor: 0,
            idle_reported: false,
            observer: Observer::new(),
        }
    }

    pub fn now(&self) -> Ticks {
        self.now
    }

    pub fn running(&self) -> Option<Pid> {
        self.running
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn next_boundary(&self) -> Option<Ticks> {
        let mut next: Option<Ticks> = self.table.at(self.arrival_cursor).map(|p| p.arrival);
        let mut consider = |t: Ticks| next = Some(next.map_or(t, |n| n.min(t)));

        if let Some(p) = self.running.and_then(|pid| self.table.get(pid).ok()) {
            consider(self.now.saturating_add(p.remaining()));
            if let Some(q) = self.scheduler.quantum() {
                consider(self.now.saturating_add(q.saturating_sub(p.quantum_used)));
            }
        }
        for p in self.table.in_state(ProcessState::Blocked) {
            consider(self.now.saturating_add(p.remaining()));
        }
        next
    }

    pub fn step(&mut self, trace: &mut Trace) -> Result<StepStatus> {
        let Some(next) = self.next_boundary() else {
            if self.table.all_terminated() {
                return Ok(StepStatus::Finished);
            }
            return Err(self.violation("ready processes left but the CPU has nothing to do"));
        };

        let delta = next - self.now;
        self.elapse(delta);
        self.now = next;
        debug!(now = self.now, delta, running = ?self.running, "cpu step");

        self.finish_burst(trace)?;
        self.wake_blocked(trace)?;
        self.admit_arrivals(trace)?;
        self.expire_quantum(trace)?;
        self.check_preemption(trace)?;
        self.dispatch(trace)?;
        self.observer
            .observe(&self.table, self.running, &self.scheduler.queued());

        if self.table.all_terminated() {
            Ok(StepStatus::Finished)
        } else {
            Ok(StepStatus::Progressed)
        }
    }

    fn violation(&self, reason: impl Into<String>) -> SimError {
        SimError::PolicyViolation {
            policy: self.scheduler.name(),
            reason: reason.into(),
        }
    }

    // Account `delta` ticks of run, I/O and wait time
    fn elapse(&mut self, delta: Ticks) {
        if delta == 0 {
            return;
        }
        for p in self.table.iter_mut() {
            match p.state() {
                ProcessState::Running => p.run_for(delta),
                ProcessState::Blocked => p.wait_io(delta),
                ProcessState::Ready => p.wait_time += delta,
                ProcessState::New | ProcessState::Terminated => {}
            }
        }
    }

    fn finish_burst(&mut self, trace: &mut Trace) -> Result<()> {
        let Some(pid) = self.running else {
            return Ok(());
        };
        let now = self.now;
        let p = self.table.get_mut(pid)?;
        if p.remaining() > 0 {
            return Ok(());
        }

        match p.advance_burst() {
            Some(Burst::Io(io)) => {
                p.transition(ProcessState::Blocked)?;
                trace.emit(now, Some(pid), EventKind::Blocked { io });
            }
            Some(Burst::Cpu(_)) => {
                return Err(self.violation(format!(
                    "process {pid} has two consecutive CPU bursts"
                )));
            }
            None => {
                p.transition(ProcessState::Terminated)?;
                p.completion_time = Some(now);
                trace.emit(now, Some(pid), EventKind::Completed);
            }
        }
        self.running = None;
        Ok(())
    }

    fn wake_blocked(&mut self, trace: &mut Trace) -> Result<()> {
        let woken: Vec<Pid> = self
            .table
            .in_state(ProcessState::Blocked)
            .filter(|p| p.remaining() == 0)
            .map(|p| p.pid)
            .collect();

        for pid in woken {
            let p = self.table.get_mut(pid)?;
            match p.advance_burst() {
                Some(Burst::Cpu(_)) => {
                    p.transition(ProcessState::Ready)?;
                    trace.emit(self.now, Some(pid), EventKind::Woken);
                    self.scheduler.enqueue(self.table.get(pid)?);
                }
                _ => {
                    return Err(self.violation(format!(
                        "process {pid} left I/O without a CPU burst to run"
                    )));
                }
            }
        }
        Ok(())
    }

    fn admit_arrivals(&mut self, trace: &mut Trace) -> Result<()> {
        while let Some(p) = self.table.at(self.arrival_cursor) {
            if p.arrival > self.now {
                break;
            }
            let pid = p.pid;
            self.arrival_cursor += 1;
            self.table.transition(pid, ProcessState::Ready)?;
            trace.emit(self.now, Some(pid), EventKind::Admitted);
            self.scheduler.enqueue(self.table.get(pid)?);
        }
        Ok(())
    }

    fn expire_quantum(&mut self, trace: &mut Trace) -> Result<()> {
        let (Some(pid), Some(quantum)) = (self.running, self.scheduler.quantum()) else {
            return Ok(());
        };
        let p = self.table.get_mut(pid)?;
        if p.quantum_used < quantum {
            return Ok(());
        }
        // Nobody else is waiting: grant a fresh quantum in place
        if self.scheduler.is_empty() {
            p.quantum_used = 0;
            return Ok(());
        }
        self.preempt(pid, PreemptReason::QuantumExpired, trace)
    }

    fn check_preemption(&mut self, trace: &mut Trace) -> Result<()> {
        let Some(pid) = self.running else {
            return Ok(());
        };
        if self.scheduler.should_preempt(self.table.get(pid)?) {
            self.preempt(pid, PreemptReason::Outranked, trace)?;
        }
        Ok(())
    }

    fn preempt(&mut self, pid: Pid, reason: PreemptReason, trace: &mut Trace) -> Result<()> {
        let p = self.table.get_mut(pid)?;
        p.transition(ProcessState::Ready)?;
        let remaining = p.remaining();
        trace.emit(self.now, Some(pid), EventKind::Preempted { remaining, reason });
        self.running = None;
        self.scheduler.enqueue(self.table.get(pid)?);
        Ok(())
    }

    fn dispatch(&mut self, trace: &mut Trace) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }

        match self.scheduler.decide(self.now, &self.table) {
            Decision::Dispatch(pid) => {
                let state = self.table.get(pid)?.state();
                if state != ProcessState::Ready {
                    return Err(self.violation(format!(
                        "selected process {pid} in state {state:?}"
                    )));
                }
                let now = self.now;
                let p = self.table.get_mut(pid)?;
                p.transition(ProcessState::Running)?;
                p.quantum_used = 0;
                p.first_dispatch.get_or_insert(now);
                let remaining = p.remaining();
                trace.emit(now, Some(pid), EventKind::Dispatched { remaining });
                self.running = Some(pid);
                self.idle_reported = false;
            }
            Decision::Idle => {
                if !self.scheduler.is_empty() {
                    return Err(self.violation("idle decision with a non-empty ready queue"));
                }
                if !self.idle_reported && !self.table.all_terminated() {
                    trace.emit(self.now, None, EventKind::CpuIdle);
                    self.idle_reported = true;
                }
            }
        }
        Ok(())
    }
}
