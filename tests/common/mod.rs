//! Shared helpers for the integration tests.

#![allow(dead_code)]

use ossim_model::{
    Event, EventKind, Pid, ProcessDescriptor, SimConfig, Simulation, Ticks,
    memory::MemUnit,
};

/// One trace entry reduced to what the golden traces pin down.
pub type Line = (Ticks, Option<Pid>, &'static str);

pub fn run(config: SimConfig, jobs: Vec<ProcessDescriptor>) -> Simulation<Vec<Event>> {
    let mut sim = Simulation::new(config, jobs, Vec::new()).expect("valid input");
    sim.run_to_completion().expect("run completes");
    sim
}

pub fn lines(trace: &[Event]) -> Vec<Line> {
    trace.iter().map(|e| (e.time, e.pid, e.kind.label())).collect()
}

pub fn job(id: Pid, arrival: Ticks, burst: Ticks) -> ProcessDescriptor {
    ProcessDescriptor::new(id, arrival, burst)
}

/// Memory request that stays resident for `duration` ticks.
pub fn request(id: Pid, arrival: Ticks, duration: Ticks, size: u64) -> ProcessDescriptor {
    ProcessDescriptor::new(id, arrival, duration).with_size(size)
}

/// `(start, size, unit)` of every allocation made for `pid`.
pub fn allocations(trace: &[Event], pid: Pid) -> Vec<(u64, u64, MemUnit)> {
    trace
        .iter()
        .filter(|e| e.pid == Some(pid))
        .filter_map(|e| match e.kind {
            EventKind::Allocated { start, size, unit } => Some((start, size, unit)),
            _ => None,
        })
        .collect()
}
