//! Simulation configuration: a policy plus the parameters it needs.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    core::Ticks,
    error::{Result, SimError},
    memory::{FitStrategy, MemoryStrategy},
    scheduler::{CpuPolicy, PriorityOrder},
};

mod defaults {
    /// Addressable units of simulated memory.
    pub const MEMORY_SIZE: u64 = 1024;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyId {
    #[default]
    Fcfs,
    Sjf,
    SjfPreemptive,
    Priority,
    PriorityPreemptive,
    RoundRobin,
    FirstFit,
    BestFit,
    WorstFit,
    Paging,
    Segmentation,
}

impl PolicyId {
    pub const ALL: [PolicyId; 11] = [
        Self::Fcfs,
        Self::Sjf,
        Self::SjfPreemptive,
        Self::Priority,
        Self::PriorityPreemptive,
        Self::RoundRobin,
        Self::FirstFit,
        Self::BestFit,
        Self::WorstFit,
        Self::Paging,
        Self::Segmentation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fcfs => "fcfs",
            Self::Sjf => "sjf",
            Self::SjfPreemptive => "sjf-preemptive",
            Self::Priority => "priority",
            Self::PriorityPreemptive => "priority-preemptive",
            Self::RoundRobin => "round-robin",
            Self::FirstFit => "first-fit",
            Self::BestFit => "best-fit",
            Self::WorstFit => "worst-fit",
            Self::Paging => "paging",
            Self::Segmentation => "segmentation",
        }
    }

    pub fn mode(self) -> SimMode {
        match self {
            Self::Fcfs
            | Self::Sjf
            | Self::SjfPreemptive
            | Self::Priority
            | Self::PriorityPreemptive
            | Self::RoundRobin => SimMode::Cpu,
            Self::FirstFit | Self::BestFit | Self::WorstFit | Self::Paging | Self::Segmentation => {
                SimMode::Memory
            }
        }
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| SimError::UnsupportedConfiguration(format!("unknown policy `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimMode {
    Cpu,
    Memory,
}

/// What happens to a memory request that does not fit right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Wait in arrival order until enough memory is released.
    #[default]
    Queue,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SimConfig {
    pub policy: PolicyId,
    /// Round-robin time slice.
    pub quantum: Option<Ticks>,
    /// Paging frame size in memory units.
    pub frame_size: Option<u64>,
    /// Turns plain SJF/Priority into their preemptive variants.
    pub preemption_enabled: Option<bool>,
    pub priority_order: PriorityOrder,
    pub memory_size: u64,
    pub on_insufficient_memory: OverflowPolicy,
    /// Placement rule for individual segments.
    pub segment_fit: FitStrategy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            policy: PolicyId::default(),
            quantum: None,
            frame_size: None,
            preemption_enabled: None,
            priority_order: PriorityOrder::default(),
            memory_size: defaults::MEMORY_SIZE,
            on_insufficient_memory: OverflowPolicy::default(),
            segment_fit: FitStrategy::default(),
        }
    }
}

/// A configuration after validation: exactly one engine and its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Cpu(CpuPolicy),
    Memory(MemoryStrategy),
}

impl Policy {
    pub fn mode(&self) -> SimMode {
        match self {
            Self::Cpu(_) => SimMode::Cpu,
            Self::Memory(_) => SimMode::Memory,
        }
    }
}

impl SimConfig {
    pub fn new(policy: PolicyId) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn with_quantum(mut self, quantum: Ticks) -> Self {
        self.quantum = Some(quantum);
        self
    }

    pub fn with_frame_size(mut self, frame_size: u64) -> Self {
        self.frame_size = Some(frame_size);
        self
    }

    pub fn with_preemption(mut self, enabled: bool) -> Self {
        self.preemption_enabled = Some(enabled);
        self
    }

    pub fn with_priority_order(mut self, order: PriorityOrder) -> Self {
        self.priority_order = order;
        self
    }

    pub fn with_memory_size(mut self, size: u64) -> Self {
        self.memory_size = size;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.on_insufficient_memory = overflow;
        self
    }

    pub fn with_segment_fit(mut self, fit: FitStrategy) -> Self {
        self.segment_fit = fit;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SimError::UnsupportedConfiguration(e.to_string()))
    }

    pub fn mode(&self) -> SimMode {
        self.policy.mode()
    }

    /// Validate and turn the flat config into the policy the engine runs.
    pub fn resolve(&self) -> Result<Policy> {
        let unsupported = |msg: &str| {
            Err(SimError::UnsupportedConfiguration(format!(
                "{}: {msg}",
                self.policy
            )))
        };
        let preempt = self.preemption_enabled.unwrap_or(false);

        let policy = match self.policy {
            PolicyId::Fcfs => Policy::Cpu(CpuPolicy::Fcfs),
            PolicyId::Sjf => Policy::Cpu(CpuPolicy::Sjf {
                preemptive: preempt,
            }),
            PolicyId::SjfPreemptive => Policy::Cpu(CpuPolicy::Sjf { preemptive: true }),
            PolicyId::Priority => Policy::Cpu(CpuPolicy::Priority {
                preemptive: preempt,
                order: self.priority_order,
            }),
            PolicyId::PriorityPreemptive => Policy::Cpu(CpuPolicy::Priority {
                preemptive: true,
                order: self.priority_order,
            }),
            PolicyId::RoundRobin => match self.quantum {
                Some(quantum) if quantum > 0 => Policy::Cpu(CpuPolicy::RoundRobin { quantum }),
                Some(_) => return unsupported("quantum must be positive"),
                None => return unsupported("quantum is required"),
            },
            PolicyId::FirstFit => Policy::Memory(MemoryStrategy::Contiguous(FitStrategy::FirstFit)),
            PolicyId::BestFit => Policy::Memory(MemoryStrategy::Contiguous(FitStrategy::BestFit)),
            PolicyId::WorstFit => Policy::Memory(MemoryStrategy::Contiguous(FitStrategy::WorstFit)),
            PolicyId::Paging => match self.frame_size {
                Some(0) => return unsupported("frame size must be positive"),
                Some(frame_size) if self.memory_size % frame_size != 0 => {
                    return unsupported(&format!(
                        "memory size {} is not a multiple of frame size {frame_size}",
                        self.memory_size
                    ));
                }
                Some(frame_size) => Policy::Memory(MemoryStrategy::Paging { frame_size }),
                None => return unsupported("frame size is required"),
            },
            PolicyId::Segmentation => Policy::Memory(MemoryStrategy::Segmentation(self.segment_fit)),
        };

        if policy.mode() == SimMode::Memory && self.memory_size == 0 {
            return unsupported("memory size must be positive");
        }
        Ok(policy)
    }
}
