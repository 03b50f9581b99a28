//! Per-process timing statistics.

use average::{Estimate, Mean};
use serde::Serialize;

use crate::core::{Pid, Process, ProcessState, ProcessTable, Ticks};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessMetrics {
    pub pid: Pid,
    pub name: String,
    pub arrival: Ticks,
    pub state: ProcessState,
    /// CPU time (memory mode: residence time) accumulated so far.
    pub service: Ticks,
    /// Time from arrival to first dispatch or allocation.
    pub response: Option<Ticks>,
    pub waiting: Ticks,
    /// Time from arrival to completion.
    pub turnaround: Option<Ticks>,
    /// Share of the time spent in the system that was spent running.
    pub cpu_rate: f64,
    /// Share of the process's own work (CPU plus I/O) that is I/O.
    pub io_rate: f64,
}

impl ProcessMetrics {
    pub fn of(process: &Process) -> Self {
        let service = process.cpu_time();
        let waiting = process.wait_time();
        let cpu_rate = if service + waiting > 0 {
            service as f64 / (service + waiting) as f64
        } else {
            0.0
        };
        let lifetime = process.lifetime();
        let io_rate = if lifetime > 0 {
            process.io_time() as f64 / lifetime as f64
        } else {
            0.0
        };
        Self {
            pid: process.pid,
            name: process.name.clone(),
            arrival: process.arrival,
            state: process.state(),
            service,
            response: process
                .first_dispatch()
                .map(|t| t.saturating_sub(process.arrival)),
            waiting,
            turnaround: process
                .completion_time()
                .map(|t| t.saturating_sub(process.arrival)),
            cpu_rate,
            io_rate,
        }
    }
}

pub fn metrics(table: &ProcessTable) -> Vec<ProcessMetrics> {
    table.iter().map(ProcessMetrics::of).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub processes: usize,
    pub completed: usize,
    pub mean_response: f64,
    pub mean_waiting: f64,
    pub mean_turnaround: f64,
    pub max_waiting: Ticks,
    /// Completed processes per tick of elapsed simulated time.
    pub throughput: f64,
}

pub fn summarize(metrics: &[ProcessMetrics], elapsed: Ticks) -> Summary {
    let response: Mean = metrics
        .iter()
        .filter_map(|m| m.response)
        .map(|t| t as f64)
        .collect();
    let waiting: Mean = metrics.iter().map(|m| m.waiting as f64).collect();
    let turnaround: Mean = metrics
        .iter()
        .filter_map(|m| m.turnaround)
        .map(|t| t as f64)
        .collect();
    let completed = metrics
        .iter()
        .filter(|m| m.state == ProcessState::Terminated)
        .count();

    Summary {
        processes: metrics.len(),
        completed,
        mean_response: nan_to_zero(response.estimate()),
        mean_waiting: nan_to_zero(waiting.estimate()),
        mean_turnaround: nan_to_zero(turnaround.estimate()),
        max_waiting: metrics.iter().map(|m| m.waiting).max().unwrap_or(0),
        throughput: if elapsed > 0 {
            completed as f64 / elapsed as f64
        } else {
            0.0
        },
    }
}

// Guard against an undefined mean of an empty sample
fn nan_to_zero(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(response: Option<Ticks>, waiting: Ticks, turnaround: Option<Ticks>) -> ProcessMetrics {
        ProcessMetrics {
            pid: 1,
            name: "P1".into(),
            arrival: 0,
            state: if turnaround.is_some() {
                ProcessState::Terminated
            } else {
                ProcessState::Ready
            },
            service: 1,
            response,
            waiting,
            turnaround,
            cpu_rate: 0.0,
            io_rate: 0.0,
        }
    }

    #[test]
    fn averages_skip_missing_values() {
        let summary = summarize(&[m(Some(0), 0, Some(4)), m(Some(2), 4, None)], 8);
        assert_eq!(summary.processes, 2);
        assert_eq!(summary.completed, 1);
        assert!((summary.mean_response - 1.0).abs() < 1e-9);
        assert!((summary.mean_waiting - 2.0).abs() < 1e-9);
        assert!((summary.mean_turnaround - 4.0).abs() < 1e-9);
        assert_eq!(summary.max_waiting, 4);
        assert!((summary.throughput - 0.125).abs() < 1e-9);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let summary = summarize(&[], 0);
        assert_eq!(summary.mean_response, 0.0);
        assert_eq!(summary.max_waiting, 0);
        assert_eq!(summary.throughput, 0.0);
    }
}
