use serde::{Deserialize, Serialize};

use crate::{
    config::SimMode,
    core::state::{Burst, Pid, Priority, Ticks},
    error::{Result, SimError},
};

/// Fully specified input for one simulated process, as built by the scenario
/// loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub id: Pid,
    /// Empty means `P<id>`.
    #[serde(default)]
    pub name: String,
    pub arrival: Ticks,
    pub bursts: Vec<Burst>,
    #[serde(default)]
    pub priority: Priority,
    /// Memory requirement; only meaningful in memory mode.
    #[serde(default)]
    pub size: u64,
    /// Segment sizes for segmentation; empty means one segment of `size`.
    #[serde(default)]
    pub segments: Vec<u64>,
}

impl ProcessDescriptor {
    /// A process with a single CPU burst.
    pub fn new(id: Pid, arrival: Ticks, burst: Ticks) -> Self {
        Self {
            id,
            name: format!("P{id}"),
            arrival,
            bursts: vec![Burst::Cpu(burst)],
            priority: 0,
            size: 0,
            segments: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Also sets `size` to the sum of the segments.
    pub fn with_segments(mut self, segments: Vec<u64>) -> Self {
        self.size = segments.iter().fold(0, |acc: u64, &s| acc.saturating_add(s));
        self.segments = segments;
        self
    }

    pub fn with_bursts(mut self, bursts: Vec<Burst>) -> Self {
        self.bursts = bursts;
        self
    }

    pub fn service_time(&self) -> Ticks {
        self.bursts
            .iter()
            .filter(|b| b.is_cpu())
            .fold(0, |acc: Ticks, b| acc.saturating_add(b.ticks()))
    }

    // Arrival times are unsigned, so `arrival >= 0` holds by construction
    pub fn validate(&self, mode: SimMode) -> Result<()> {
        let invalid = |reason: &str| {
            Err(SimError::InvalidDescriptor {
                pid: self.id,
                reason: reason.to_owned(),
            })
        };

        match (self.bursts.first(), self.bursts.last()) {
            (Some(Burst::Cpu(_)), Some(Burst::Cpu(_))) => {}
            (None, _) => return invalid("no bursts"),
            _ => return invalid("burst sequence must start and end with a CPU burst"),
        }
        if self.bursts.iter().any(|b| b.ticks() == 0) {
            return invalid("bursts must be positive");
        }
        if self
            .bursts
            .windows(2)
            .any(|w| w[0].is_cpu() == w[1].is_cpu())
        {
            return invalid("CPU and I/O bursts must alternate");
        }
        let end = self
            .bursts
            .iter()
            .try_fold(self.arrival, |t, b| t.checked_add(b.ticks()));
        if end.is_none() {
            return invalid("arrival plus total burst time overflows the clock");
        }

        if mode == SimMode::Memory {
            if self.size == 0 {
                return invalid("memory size must be positive");
            }
            if !self.segments.is_empty() {
                if self.segments.contains(&0) {
                    return invalid("segment sizes must be positive");
                }
                let total = self
                    .segments
                    .iter()
                    .try_fold(0u64, |acc, &s| acc.checked_add(s));
                if total != Some(self.size) {
                    return invalid("segment sizes must add up to the process size");
                }
            }
        }
        Ok(())
    }
}

/// Validate a whole input set, including id uniqueness.
pub fn validate_all(descriptors: &[ProcessDescriptor], mode: SimMode) -> Result<()> {
    let mut seen = rustc_hash::FxHashSet::default();
    for desc in descriptors {
        desc.validate(mode)?;
        if !seen.insert(desc.id) {
            return Err(SimError::InvalidDescriptor {
                pid: desc.id,
                reason: "duplicate process id".into(),
            });
        }
    }
    Ok(())
}
