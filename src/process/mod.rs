/*!
 * Process Module
 * Child spawning, reaping, termination and bounded job execution
 */

pub mod argv;
pub mod manager;
pub mod pool;
pub mod registry;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use argv::{tokenize, ArgVector, ExecArgv};
pub use manager::ChildManager;
pub use pool::{JobOutcome, JobRunner, RunSummary};
pub use registry::ChildRegistry;
pub use traits::ChildLifecycle;
pub use types::{
    KillSummary, LiveCount, ReapOutcome, Reaped, SignalOutcome, EXEC_FAILURE_STATUS,
};
