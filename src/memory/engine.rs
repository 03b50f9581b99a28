use std::collections::VecDeque;

use tracing::debug;

use super::{
    map::{MemoryMap, Owner},
    strategy::{MemoryStrategy, Placement},
};
use crate::{
    config::OverflowPolicy,
    core::{
        EventKind, Fragmentation, Pid, ProcessState, ProcessTable, Ticks, Trace,
        driver::StepStatus,
    },
    error::{Result, SimError},
};

/// Memory-management engine. Processes arrive with a size request, stay
/// resident for their lifetime once placed, then release their memory.
#[derive(Debug)]
pub struct MemCore {
    pub table: ProcessTable,
    map: MemoryMap,
    strategy: MemoryStrategy,
    overflow: OverflowPolicy,
    // Admitted but not yet placed, served strictly in order
    waiting: VecDeque<Pid>,
    // (departure time, pid) of resident processes
    resident: Vec<(Ticks, Pid)>,
    now: Ticks,
    arrival_cursor: usize,
    // Head of the queue we already reported external fragmentation for
    fragmentation_reported: Option<Pid>,
}

impl MemCore {
    pub fn new(
        table: ProcessTable,
        strategy: MemoryStrategy,
        capacity: u64,
        overflow: OverflowPolicy,
    ) -> Self {
        Self {
            table,
            map: strategy.new_map(capacity),
            strategy,
            overflow,
            waiting: VecDeque::new(),
            resident: Vec::new(),
            now: 0,
            arrival_cursor: 0,
            fragmentation_reported: None,
        }
    }

    pub fn now(&self) -> Ticks {
        self.now
    }

    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    pub fn strategy(&self) -> &MemoryStrategy {
        &self.strategy
    }

    pub fn waiting(&self) -> Vec<Pid> {
        self.waiting.iter().copied().collect()
    }

    pub fn next_boundary(&self) -> Option<Ticks> {
        let arrival = self.table.at(self.arrival_cursor).map(|p| p.arrival);
        let departure = self.resident.iter().map(|&(at, _)| at).min();
        match (arrival, departure) {
            (Some(a), Some(d)) => Some(a.min(d)),
            (a, d) => a.or(d),
        }
    }

    pub fn step(&mut self, trace: &mut Trace) -> Result<StepStatus> {
        let Some(next) = self.next_boundary() else {
            if self.table.all_terminated() {
                return Ok(StepStatus::Finished);
            }
            return Err(SimError::PolicyViolation {
                policy: self.strategy.name(),
                reason: "requests are waiting but nothing is left to free memory".into(),
            });
        };

        let delta = next - self.now;
        self.elapse(delta);
        self.now = next;
        debug!(now = self.now, delta, "memory step");

        self.depart(trace)?;
        self.admit_arrivals(trace)?;
        self.place_waiting(trace)?;
        self.observe();

        if self.table.all_terminated() {
            Ok(StepStatus::Finished)
        } else {
            Ok(StepStatus::Progressed)
        }
    }

    fn elapse(&mut self, delta: Ticks) {
        for p in self.table.iter_mut() {
            match p.state() {
                ProcessState::Ready => p.wait_time += delta,
                ProcessState::Running => p.cpu_time += delta,
                _ => {}
            }
        }
    }

    fn depart(&mut self, trace: &mut Trace) -> Result<()> {
        let now = self.now;
        let mut leaving: Vec<Pid> = self
            .resident
            .iter()
            .filter(|&&(at, _)| at == now)
            .map(|&(_, pid)| pid)
            .collect();
        if leaving.is_empty() {
            return Ok(());
        }
        self.resident.retain(|&(at, _)| at != now);
        // Same visiting order as the process table
        leaving.sort_by_key(|&pid| {
            let p = self.table.get(pid).ok();
            (p.map(|p| p.arrival), pid)
        });

        for pid in leaving {
            for block in self.map.release(pid) {
                let Owner::Process { unit, .. } = block.owner else {
                    continue;
                };
                trace.emit(
                    now,
                    Some(pid),
                    EventKind::Freed {
                        start: block.start,
                        size: block.size,
                        unit,
                    },
                );
            }
            let p = self.table.get_mut(pid)?;
            p.transition(ProcessState::Terminated)?;
            p.completion_time = Some(now);
            trace.emit(now, Some(pid), EventKind::Completed);
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

            if !self.strategy.can_ever_fit(self.map.capacity(), p) {
                self.reject(pid, trace)?;
                continue;
            }

            match self.overflow {
                OverflowPolicy::Queue => {
                    self.table.transition(pid, ProcessState::Ready)?;
                    trace.emit(self.now, Some(pid), EventKind::Admitted);
                    self.waiting.push_back(pid);
                }
                OverflowPolicy::Reject => {
                    let p = self.table.get(pid)?;
                    match self.strategy.place(&self.map, p) {
                        Ok(placement) => {
                            self.table.transition(pid, ProcessState::Ready)?;
                            trace.emit(self.now, Some(pid), EventKind::Admitted);
                            self.apply(pid, placement, trace)?;
                        }
                        Err(SimError::InsufficientMemory { .. }) => self.reject(pid, trace)?,
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }

    fn reject(&mut self, pid: Pid, trace: &mut Trace) -> Result<()> {
        let p = self.table.get_mut(pid)?;
        let requested = p.size;
        p.transition(ProcessState::Terminated)?;
        p.completion_time = Some(self.now);
        debug!(pid, requested, "request rejected");
        trace.emit(self.now, Some(pid), EventKind::Rejected { requested });
        Ok(())
    }

    fn place_waiting(&mut self, trace: &mut Trace) -> Result<()> {
        while let Some(&pid) = self.waiting.front() {
            let p = self.table.get(pid)?;
            match self.strategy.place(&self.map, p) {
                Ok(placement) => {
                    self.waiting.pop_front();
                    self.apply(pid, placement, trace)?;
                }
                Err(SimError::InsufficientMemory { requested, .. }) => {
                    let free = self.map.free_total();
                    if free >= p.size && self.fragmentation_reported != Some(pid) {
                        self.fragmentation_reported = Some(pid);
                        debug!(pid, requested, free, "external fragmentation");
                        trace.emit(
                            self.now,
                            Some(pid),
                            EventKind::Fragmented {
                                fragmentation: Fragmentation::External,
                                amount: free,
                            },
                        );
                    }
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn apply(&mut self, pid: Pid, placement: Placement, trace: &mut Trace) -> Result<()> {
        for extent in &placement.extents {
            self.map.claim(pid, *extent)?;
            trace.emit(
                self.now,
                Some(pid),
                EventKind::Allocated {
                    start: extent.start,
                    size: extent.size,
                    unit: extent.unit,
                },
            );
        }
        if placement.internal_waste > 0 {
            trace.emit(
                self.now,
                Some(pid),
                EventKind::Fragmented {
                    fragmentation: Fragmentation::Internal,
                    amount: placement.internal_waste,
                },
            );
        }

        let now = self.now;
        let p = self.table.get_mut(pid)?;
        p.transition(ProcessState::Running)?;
        p.first_dispatch.get_or_insert(now);
        self.resident.push((now.saturating_add(p.lifetime()), pid));
        Ok(())
    }

    fn observe(&self) {
        debug_assert!(self.map.is_partitioned(), "memory map no longer partitions the address space");
        for &(_, pid) in &self.resident {
            debug_assert!(
                self.map.owned_by(pid).next().is_some(),
                "resident process {pid} owns no memory"
            );
        }
        for &pid in &self.waiting {
            debug_assert!(
                self.table
                    .get(pid)
                    .is_ok_and(|p| p.state() == ProcessState::Ready),
                "waiting process {pid} must be Ready"
            );
        }
    }
}
