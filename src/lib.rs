pub mod config;
pub mod core;
pub mod error;
pub mod memory;
pub mod scheduler;
pub mod sim;

pub use config::{OverflowPolicy, PolicyId, SimConfig};
pub use crate::core::{Burst, Event, EventKind, EventSink, Pid, ProcessState, Ticks};
pub use error::{Result, SimError};
pub use scheduler::Scheduler;
pub use sim::{ProcessDescriptor, SimHandle, Simulation, StepOutcome};
