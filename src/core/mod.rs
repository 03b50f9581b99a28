pub mod driver;
pub mod event;
pub mod observer;
pub mod queue;
pub mod sink;
pub mod state;

pub use driver::{CpuCore, StepStatus};
pub use event::{Event, EventKind, Fragmentation, PreemptReason, Trace};
pub use sink::{ChannelSink, EventSink, FnSink, NullSink};
pub use state::{Burst, Pid, Priority, Process, ProcessState, ProcessTable, Ticks};
