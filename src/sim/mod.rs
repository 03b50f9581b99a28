pub mod driver;
pub mod handle;
pub mod job;
pub mod stats;

pub use driver::{ProcessSnapshot, RunState, Simulation, Snapshot, StepOutcome};
pub use handle::SimHandle;
pub use job::{ProcessDescriptor, validate_all};
pub use stats::{ProcessMetrics, Summary};
