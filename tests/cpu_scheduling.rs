mod common;

use common::{job, lines, run};
use ossim_model::{
    Burst, EventKind, PolicyId, ProcessState, SimConfig,
    core::PreemptReason,
    scheduler::PriorityOrder,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn fcfs_runs_in_arrival_order() {
    let sim = run(
        SimConfig::new(PolicyId::Fcfs),
        vec![job(1, 0, 3), job(2, 1, 2), job(3, 5, 1)],
    );
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(1), "dispatched"),
            (1, Some(2), "admitted"),
            (3, Some(1), "completed"),
            (3, Some(2), "dispatched"),
            (5, Some(2), "completed"),
            (5, Some(3), "admitted"),
            (5, Some(3), "dispatched"),
            (6, Some(3), "completed"),
        ]
    );

    let waiting: Vec<_> = sim.metrics().iter().map(|m| m.waiting).collect();
    assert_eq!(waiting, vec![0, 2, 0]);
    let turnaround: Vec<_> = sim.metrics().iter().map(|m| m.turnaround).collect();
    assert_eq!(turnaround, vec![Some(3), Some(4), Some(1)]);
}

#[test]
fn idle_cpu_is_reported_once_per_gap() {
    let sim = run(SimConfig::new(PolicyId::Fcfs), vec![job(1, 0, 2), job(2, 5, 1)]);
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(1), "dispatched"),
            (2, Some(1), "completed"),
            (2, None, "cpu-idle"),
            (5, Some(2), "admitted"),
            (5, Some(2), "dispatched"),
            (6, Some(2), "completed"),
        ]
    );
}

#[test]
fn round_robin_rotates_on_quantum_expiry() {
    let sim = run(
        SimConfig::new(PolicyId::RoundRobin).with_quantum(2),
        vec![job(1, 0, 5), job(2, 0, 3)],
    );
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(2), "admitted"),
            (0, Some(1), "dispatched"),
            (2, Some(1), "preempted"),
            (2, Some(2), "dispatched"),
            (4, Some(2), "preempted"),
            (4, Some(1), "dispatched"),
            (6, Some(1), "preempted"),
            (6, Some(2), "dispatched"),
            (7, Some(2), "completed"),
            (7, Some(1), "dispatched"),
            (8, Some(1), "completed"),
        ]
    );
    assert!(sim.trace().iter().all(|e| !matches!(
        e.kind,
        EventKind::Preempted {
            reason: PreemptReason::Outranked,
            ..
        }
    )));
}

#[test]
fn round_robin_alone_keeps_the_cpu() {
    let sim = run(
        SimConfig::new(PolicyId::RoundRobin).with_quantum(2),
        vec![job(1, 0, 7)],
    );
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(1), "dispatched"),
            (7, Some(1), "completed"),
        ]
    );
}

#[test]
fn round_robin_queues_newcomers_before_the_expired_process() {
    let sim = run(
        SimConfig::new(PolicyId::RoundRobin).with_quantum(2),
        vec![job(1, 0, 4), job(2, 2, 1)],
    );
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(1), "dispatched"),
            (2, Some(2), "admitted"),
            (2, Some(1), "preempted"),
            (2, Some(2), "dispatched"),
            (3, Some(2), "completed"),
            (3, Some(1), "dispatched"),
            (5, Some(1), "completed"),
        ]
    );
}

fn sjf_workload() -> Vec<ossim_model::ProcessDescriptor> {
    vec![job(1, 0, 7), job(2, 2, 4), job(3, 4, 1), job(4, 5, 4)]
}

#[test]
fn sjf_picks_the_shortest_waiting_job() {
    let sim = run(SimConfig::new(PolicyId::Sjf), sjf_workload());
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(1), "dispatched"),
            (2, Some(2), "admitted"),
            (4, Some(3), "admitted"),
            (5, Some(4), "admitted"),
            (7, Some(1), "completed"),
            (7, Some(3), "dispatched"),
            (8, Some(3), "completed"),
            (8, Some(2), "dispatched"),
            (12, Some(2), "completed"),
            (12, Some(4), "dispatched"),
            (16, Some(4), "completed"),
        ]
    );
}

#[test]
fn preemptive_sjf_follows_shortest_remaining_time() {
    let sim = run(SimConfig::new(PolicyId::SjfPreemptive), sjf_workload());
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(1), "dispatched"),
            (2, Some(2), "admitted"),
            (2, Some(1), "preempted"),
            (2, Some(2), "dispatched"),
            (4, Some(3), "admitted"),
            (4, Some(2), "preempted"),
            (4, Some(3), "dispatched"),
            (5, Some(3), "completed"),
            (5, Some(4), "admitted"),
            (5, Some(2), "dispatched"),
            (7, Some(2), "completed"),
            (7, Some(4), "dispatched"),
            (11, Some(4), "completed"),
            (11, Some(1), "dispatched"),
            (16, Some(1), "completed"),
        ]
    );

    let preempted = sim
        .trace()
        .iter()
        .find(|e| matches!(e.kind, EventKind::Preempted { .. }))
        .map(|e| e.kind.clone());
    assert_eq!(
        preempted,
        Some(EventKind::Preempted {
            remaining: 5,
            reason: PreemptReason::Outranked,
        })
    );
}

#[test]
fn equal_remaining_time_does_not_preempt() {
    let sim = run(
        SimConfig::new(PolicyId::Sjf).with_preemption(true),
        vec![job(1, 0, 4), job(2, 2, 2)],
    );
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(1), "dispatched"),
            (2, Some(2), "admitted"),
            (4, Some(1), "completed"),
            (4, Some(2), "dispatched"),
            (6, Some(2), "completed"),
        ]
    );
}

fn priority_workload() -> Vec<ossim_model::ProcessDescriptor> {
    vec![
        job(1, 0, 4).with_priority(3),
        job(2, 1, 3).with_priority(1),
        job(3, 2, 1).with_priority(2),
        job(4, 3, 2).with_priority(1),
    ]
}

#[test]
fn priority_serves_lowest_number_first() {
    let sim = run(SimConfig::new(PolicyId::Priority), priority_workload());
    let dispatches: Vec<_> = lines(sim.trace())
        .into_iter()
        .filter(|l| l.2 == "dispatched")
        .collect();
    assert_eq!(
        dispatches,
        vec![
            (0, Some(1), "dispatched"),
            (4, Some(2), "dispatched"),
            (7, Some(4), "dispatched"),
            (9, Some(3), "dispatched"),
        ]
    );
    assert_eq!(sim.now(), 10);
}

#[test]
fn preemptive_priority_displaces_a_worse_process() {
    let sim = run(SimConfig::new(PolicyId::PriorityPreemptive), priority_workload());
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(1), "dispatched"),
            (1, Some(2), "admitted"),
            (1, Some(1), "preempted"),
            (1, Some(2), "dispatched"),
            (2, Some(3), "admitted"),
            (3, Some(4), "admitted"),
            (4, Some(2), "completed"),
            (4, Some(4), "dispatched"),
            (6, Some(4), "completed"),
            (6, Some(3), "dispatched"),
            (7, Some(3), "completed"),
            (7, Some(1), "dispatched"),
            (10, Some(1), "completed"),
        ]
    );
}

#[rstest]
#[case::lower_first(PriorityOrder::LowerFirst, 1)]
#[case::higher_first(PriorityOrder::HigherFirst, 2)]
fn priority_order_is_configurable(#[case] order: PriorityOrder, #[case] first: u64) {
    let sim = run(
        SimConfig::new(PolicyId::Priority).with_priority_order(order),
        vec![job(1, 0, 2).with_priority(1), job(2, 0, 2).with_priority(5)],
    );
    let first_dispatch = sim
        .trace()
        .iter()
        .find(|e| e.kind.label() == "dispatched")
        .and_then(|e| e.pid);
    assert_eq!(first_dispatch, Some(first));
}

#[test]
fn io_bursts_block_and_wake() {
    let sim = run(
        SimConfig::new(PolicyId::Fcfs),
        vec![
            job(1, 0, 2).with_bursts(vec![Burst::Cpu(2), Burst::Io(3), Burst::Cpu(1)]),
            job(2, 0, 2),
        ],
    );
    assert_eq!(
        lines(sim.trace()),
        vec![
            (0, Some(1), "admitted"),
            (0, Some(2), "admitted"),
            (0, Some(1), "dispatched"),
            (2, Some(1), "blocked"),
            (2, Some(2), "dispatched"),
            (4, Some(2), "completed"),
            (4, None, "cpu-idle"),
            (5, Some(1), "woken"),
            (5, Some(1), "dispatched"),
            (6, Some(1), "completed"),
        ]
    );

    let metrics = sim.metrics();
    let p1 = &metrics[0];
    assert_eq!(p1.service, 3);
    assert_eq!(p1.waiting, 0);
    assert_eq!(p1.turnaround, Some(6));
    // Three of its six ticks of work are I/O
    assert!((p1.io_rate - 0.5).abs() < 1e-9);
    assert_eq!(metrics[1].io_rate, 0.0);
}

#[test]
fn every_process_ends_terminated() {
    let sim = run(
        SimConfig::new(PolicyId::RoundRobin).with_quantum(3),
        vec![job(1, 0, 4), job(2, 1, 5), job(3, 9, 2)],
    );
    assert!(
        sim.snapshot()
            .processes
            .iter()
            .all(|p| p.state == ProcessState::Terminated && p.remaining == 0)
    );
    let summary = sim.summary();
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.processes, 3);
}

#[test]
fn empty_workload_finishes_immediately() {
    let sim = run(SimConfig::new(PolicyId::Fcfs), Vec::new());
    assert!(sim.trace().is_empty());
    assert!(sim.is_completed());
    assert_eq!(sim.now(), 0);
}
