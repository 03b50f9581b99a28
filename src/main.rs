use std::path::PathBuf;

use anyhow::Context;
use average::Estimate;
use clap::Parser;
use ossim_model::{
    Burst, Event, EventKind, PolicyId, ProcessDescriptor, SimConfig, Simulation, Ticks,
    config::SimMode, core::FnSink,
};
use rand::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "ossim",
    version,
    about = "Run a process workload through a CPU scheduling or memory placement policy"
)]
struct Cli {
    /// fcfs, sjf, sjf-preemptive, priority, priority-preemptive, round-robin,
    /// first-fit, best-fit, worst-fit, paging or segmentation.
    #[arg(short, long, default_value = "fcfs")]
    policy: PolicyId,

    /// Round-robin time slice.
    #[arg(short, long)]
    quantum: Option<u64>,

    /// Paging frame size.
    #[arg(long)]
    frame_size: Option<u64>,

    /// Use the preemptive variant of SJF or Priority.
    #[arg(long)]
    preempt: bool,

    #[arg(long, default_value_t = 1024)]
    memory_size: u64,

    /// JSON file with a list of process descriptors. A random workload is
    /// generated when absent.
    #[arg(long)]
    jobs: Option<PathBuf>,

    /// Length of the arrival window for the random workload.
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// Per-tick arrival probability for the random workload.
    #[arg(long, default_value_t = 0.3)]
    p_arrival: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Print events as JSON lines instead of debug text.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = SimConfig::new(cli.policy).with_memory_size(cli.memory_size);
    config.quantum = cli.quantum;
    config.frame_size = cli.frame_size;
    if cli.preempt {
        config = config.with_preemption(true);
    }

    let jobs: Vec<ProcessDescriptor> = match &cli.jobs {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => bernoulli_jobs(
            cli.ticks,
            cli.p_arrival,
            config.mode(),
            cli.memory_size,
            cli.seed,
        ),
    };

    let json = cli.json;
    let printer = FnSink(move |event: &Event| {
        if json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to encode event"),
            }
        } else {
            println!("t={} {:?} {:?}", event.time, event.pid, event.kind);
        }
    });

    let mut sim = Simulation::new(config, jobs, printer).context("invalid simulation input")?;
    sim.run_to_completion().context("simulation failed")?;

    let summary = sim.summary();
    let metrics = sim.metrics();

    println!("Policy: {}", sim.snapshot().policy);
    println!(
        "Completed {} of {} processes in {} ticks",
        summary.completed,
        summary.processes,
        sim.now()
    );
    println!("Average response time: {:.2} ticks", summary.mean_response);
    println!("Average waiting time: {:.2} ticks", summary.mean_waiting);
    println!("Average turnaround time: {:.2} ticks", summary.mean_turnaround);
    println!("Average CPU rate: {:.2}", avg(metrics.iter().map(|m| m.cpu_rate)));
    if sim.policy().mode() == SimMode::Cpu {
        println!("Average I/O rate: {:.2}", avg(metrics.iter().map(|m| m.io_rate)));
    }
    println!("Longest wait: {} ticks", summary.max_waiting);
    if sim.policy().mode() == SimMode::Cpu {
        println!("Longest idle period: {} ticks", longest_idle(sim.trace()));
    }

    Ok(())
}

// Time from each `CpuIdle` to the next dispatch
fn longest_idle(trace: &[Event]) -> Ticks {
    let mut idle_since = None;
    let mut longest = 0;
    for event in trace {
        match event.kind {
            EventKind::CpuIdle => idle_since = Some(event.time),
            EventKind::Dispatched { .. } => {
                if let Some(since) = idle_since.take() {
                    longest = longest.max(event.time - since);
                }
            }
            _ => {}
        }
    }
    longest
}

fn bernoulli_jobs(
    ticks: u64,
    p_arrival: f64,
    mode: SimMode,
    memory_size: u64,
    seed: u64,
) -> Vec<ProcessDescriptor> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut jobs = Vec::new();

    for t in 0..ticks {
        if rng.random::<f64>() < p_arrival {
            let id = jobs.len() as u64 + 1;
            let mut job = ProcessDescriptor::new(id, t, rng.random_range(1..=8))
                .with_priority(rng.random_range(0..5));

            // Some processes do a round of I/O between two CPU bursts
            if mode == SimMode::Cpu && rng.random::<f64>() < 0.25 {
                job = job.with_bursts(vec![
                    Burst::Cpu(rng.random_range(1..=4)),
                    Burst::Io(rng.random_range(2..=6)),
                    Burst::Cpu(rng.random_range(1..=4)),
                ]);
            }
            if mode == SimMode::Memory {
                let most = (memory_size / 4).max(1);
                let size = rng.random_range(1..=most);
                job = if size >= 2 && rng.random::<bool>() {
                    job.with_segments(vec![size / 2, size - size / 2])
                } else {
                    job.with_size(size)
                };
            }
            jobs.push(job);
        }
    }

    jobs
}

fn avg(iter: impl Iterator<Item = f64>) -> f64 {
    iter.collect::<average::Mean>().estimate()
}
