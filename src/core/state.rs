use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SimError},
    sim::job::ProcessDescriptor,
};

pub type Pid = u64;
pub type Ticks = u64;
// Lower is more urgent unless the priority order is flipped in the config
pub type Priority = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Burst {
    Cpu(Ticks),
    Io(Ticks),
}

impl Burst {
    pub fn ticks(self) -> Ticks {
        match self {
            Self::Cpu(n) | Self::Io(n) => n,
        }
    }

    pub fn is_cpu(self) -> bool {
        matches!(self, Self::Cpu(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl ProcessState {
    /// Legal lifecycle edges. `New -> Terminated` is reserved for memory
    /// requests rejected on admission.
    pub fn can_transition_to(self, to: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, to),
            (New, Ready)
                | (New, Terminated)
                | (Ready, Running)
                | (Running, Ready)
                | (Running, Blocked)
                | (Running, Terminated)
                | (Blocked, Ready)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub arrival: Ticks,
    pub priority: Priority,
    pub size: u64,
    pub segments: Vec<u64>,
    bursts: Vec<Burst>,
    burst_index: usize,
    // Ticks left in the current burst
    remaining: Ticks,
    state: ProcessState,
    pub(crate) cpu_time: Ticks,
    pub(crate) wait_time: Ticks,
    pub(crate) quantum_used: Ticks,
    pub(crate) first_dispatch: Option<Ticks>,
    pub(crate) completion_time: Option<Ticks>,
}

impl Process {
    pub fn from_descriptor(desc: &ProcessDescriptor) -> Self {
        Self {
            pid: desc.id,
            name: if desc.name.is_empty() {
                format!("P{}", desc.id)
            } else {
                desc.name.clone()
            },
            arrival: desc.arrival,
            priority: desc.priority,
            size: desc.size,
            segments: desc.segments.clone(),
            bursts: desc.bursts.clone(),
            burst_index: 0,
            remaining: desc.bursts.first().map_or(0, |b| b.ticks()),
            state: ProcessState::New,
            cpu_time: 0,
            wait_time: 0,
            quantum_used: 0,
            first_dispatch: None,
            completion_time: None,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn transition(&mut self, to: ProcessState) -> Result<ProcessState> {
        let from = self.state;
        if from == ProcessState::Terminated {
            return Err(SimError::TerminalStateViolation { pid: self.pid, to });
        }
        if !from.can_transition_to(to) {
            return Err(SimError::InvalidTransition {
                pid: self.pid,
                from,
                to,
            });
        }
        self.state = to;
        Ok(from)
    }

    pub fn current_burst(&self) -> Option<Burst> {
        self.bursts.get(self.burst_index).copied()
    }

    pub fn remaining(&self) -> Ticks {
        self.remaining
    }

    pub fn bursts(&self) -> &[Burst] {
        &self.bursts
    }

    /// Total CPU time the process needs over its whole life.
    pub fn service_time(&self) -> Ticks {
        self.bursts
            .iter()
            .filter(|b| b.is_cpu())
            .fold(0, |acc: Ticks, b| acc.saturating_add(b.ticks()))
    }

    /// CPU and I/O bursts together; memory mode uses this as residence time.
    pub fn lifetime(&self) -> Ticks {
        self.bursts
            .iter()
            .fold(0, |acc: Ticks, b| acc.saturating_add(b.ticks()))
    }

    pub fn io_time(&self) -> Ticks {
        self.bursts
            .iter()
            .filter(|b| !b.is_cpu())
            .fold(0, |acc: Ticks, b| acc.saturating_add(b.ticks()))
    }

    pub fn cpu_time(&self) -> Ticks {
        self.cpu_time
    }

    pub fn wait_time(&self) -> Ticks {
        self.wait_time
    }

    pub fn first_dispatch(&self) -> Option<Ticks> {
        self.first_dispatch
    }

    pub fn completion_time(&self) -> Option<Ticks> {
        self.completion_time
    }

    pub(crate) fn run_for(&mut self, delta: Ticks) {
        debug_assert!(delta <= self.remaining, "process {} overran its burst", self.pid);
        self.remaining = self.remaining.saturating_sub(delta);
        self.cpu_time = self.cpu_time.saturating_add(delta);
        self.quantum_used = self.quantum_used.saturating_add(delta);
    }

    pub(crate) fn wait_io(&mut self, delta: Ticks) {
        debug_assert!(delta <= self.remaining, "process {} overran its I/O", self.pid);
        self.remaining = self.remaining.saturating_sub(delta);
    }

    // Move to the next burst, returning it (None once the sequence is exhausted)
    pub(crate) fn advance_burst(&mut self) -> Option<Burst> {
        self.burst_index += 1;
        let next = self.current_burst();
        self.remaining = next.map_or(0, Burst::ticks);
        next
    }
}

/// Owns every simulated process in `(arrival, pid)` order, which is also the
/// order the drivers visit them in when several change at the same tick.
#[derive(Debug, Clone)]
pub struct ProcessTable {
    procs: Vec<Process>,
    index: FxHashMap<Pid, usize>,
}

impl ProcessTable {
    pub fn new(descriptors: &[ProcessDescriptor]) -> Result<Self> {
        let mut procs: Vec<Process> = descriptors.iter().map(Process::from_descriptor).collect();
        procs.sort_by(|a, b| a.arrival.cmp(&b.arrival).then_with(|| a.pid.cmp(&b.pid)));

        let mut index = FxHashMap::default();
        for (i, p) in procs.iter().enumerate() {
            if index.insert(p.pid, i).is_some() {
                return Err(SimError::InvalidDescriptor {
                    pid: p.pid,
                    reason: "duplicate process id".into(),
                });
            }
        }

        Ok(Self { procs, index })
    }

    pub fn get(&self, pid: Pid) -> Result<&Process> {
        self.index
            .get(&pid)
            .map(|&i| &self.procs[i])
            .ok_or(SimError::UnknownProcess(pid))
    }

    pub fn get_mut(&mut self, pid: Pid) -> Result<&mut Process> {
        match self.index.get(&pid) {
            Some(&i) => Ok(&mut self.procs[i]),
            None => Err(SimError::UnknownProcess(pid)),
        }
    }

    /// Position-based access, used by the drivers' arrival cursors.
    pub fn at(&self, position: usize) -> Option<&Process> {
        self.procs.get(position)
    }

    pub fn transition(&mut self, pid: Pid, to: ProcessState) -> Result<ProcessState> {
        self.get_mut(pid)?.transition(to)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.procs.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.procs.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    pub fn in_state(&self, state: ProcessState) -> impl Iterator<Item = &Process> {
        self.procs.iter().filter(move |p| p.state == state)
    }

    pub fn all_terminated(&self) -> bool {
        self.procs
            .iter()
            .all(|p| p.state == ProcessState::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(bursts: Vec<Burst>) -> Process {
        Process::from_descriptor(&ProcessDescriptor::new(7, 0, 1).with_bursts(bursts))
    }

    #[test]
    fn legal_lifecycle() {
        let mut p = proc(vec![Burst::Cpu(3)]);
        assert_eq!(p.transition(ProcessState::Ready), Ok(ProcessState::New));
        assert_eq!(p.transition(ProcessState::Running), Ok(ProcessState::Ready));
        assert_eq!(p.transition(ProcessState::Blocked), Ok(ProcessState::Running));
        assert_eq!(p.transition(ProcessState::Ready), Ok(ProcessState::Blocked));
        p.transition(ProcessState::Running).unwrap();
        p.transition(ProcessState::Terminated).unwrap();
        assert_eq!(p.state(), ProcessState::Terminated);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut p = proc(vec![Burst::Cpu(3)]);
        assert_eq!(
            p.transition(ProcessState::Running),
            Err(SimError::InvalidTransition {
                pid: 7,
                from: ProcessState::New,
                to: ProcessState::Running,
            })
        );
        assert_eq!(p.state(), ProcessState::New);
    }

    #[test]
    fn terminated_is_final() {
        let mut p = proc(vec![Burst::Cpu(3)]);
        p.transition(ProcessState::Terminated).unwrap();
        for to in [
            ProcessState::New,
            ProcessState::Ready,
            ProcessState::Running,
            ProcessState::Blocked,
            ProcessState::Terminated,
        ] {
            assert_eq!(
                p.transition(to),
                Err(SimError::TerminalStateViolation { pid: 7, to })
            );
        }
    }

    #[test]
    fn bursts_advance_in_order() {
        let mut p = proc(vec![Burst::Cpu(2), Burst::Io(4), Burst::Cpu(1)]);
        assert_eq!(p.service_time(), 3);
        assert_eq!(p.lifetime(), 7);
        assert_eq!(p.remaining(), 2);
        p.run_for(2);
        assert_eq!(p.advance_burst(), Some(Burst::Io(4)));
        assert_eq!(p.remaining(), 4);
        p.wait_io(4);
        assert_eq!(p.advance_burst(), Some(Burst::Cpu(1)));
        p.run_for(1);
        assert_eq!(p.advance_burst(), None);
        assert_eq!(p.cpu_time(), 3);
    }

    #[test]
    fn table_orders_by_arrival_then_pid() {
        let table = ProcessTable::new(&[
            ProcessDescriptor::new(3, 5, 1),
            ProcessDescriptor::new(2, 0, 1),
            ProcessDescriptor::new(1, 0, 1),
        ])
        .unwrap();
        let order: Vec<Pid> = table.iter().map(|p| p.pid).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(table.get(3).unwrap().arrival, 5);
        assert_eq!(table.get(9).unwrap_err(), SimError::UnknownProcess(9));
    }

    #[test]
    fn duplicate_pid_is_invalid() {
        let err = ProcessTable::new(&[
            ProcessDescriptor::new(1, 0, 1),
            ProcessDescriptor::new(1, 2, 1),
        ])
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidDescriptor { pid: 1, .. }));
    }
}
