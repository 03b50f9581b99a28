use thiserror::Error;

use crate::core::{Pid, ProcessState};

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("invalid descriptor for process {pid}: {reason}")]
    InvalidDescriptor { pid: Pid, reason: String },

    /// Raised by the entity model. Under correct policies this is unreachable.
    #[error("process {pid}: illegal transition {from:?} -> {to:?}")]
    InvalidTransition {
        pid: Pid,
        from: ProcessState,
        to: ProcessState,
    },

    #[error("process {pid} is terminated and cannot move to {to:?}")]
    TerminalStateViolation { pid: Pid, to: ProcessState },

    #[error("process {pid} needs {requested} units, largest free extent is {largest_free}")]
    InsufficientMemory {
        pid: Pid,
        requested: u64,
        largest_free: u64,
    },

    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// A policy handed the driver a decision it must never make.
    #[error("policy {policy} violated an engine invariant: {reason}")]
    PolicyViolation { policy: &'static str, reason: String },

    #[error("unknown process {0}")]
    UnknownProcess(Pid),

    #[error("cannot {action} a simulation that is {state}")]
    IllegalControl {
        action: &'static str,
        state: &'static str,
    },
}

impl SimError {
    /// Engine bugs as opposed to conditions a caller can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::TerminalStateViolation { .. }
                | Self::PolicyViolation { .. }
                | Self::UnknownProcess(_)
        )
    }
}
