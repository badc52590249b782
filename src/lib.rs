/*!
 * procpool Library
 * Bounded worker-process pool with System V IPC hand-off
 */

pub mod core;
pub mod ipc;
pub mod monitoring;
pub mod process;
pub mod signals;

// Re-exports
pub use crate::core::{FailFast, PoolConfig, PoolError, PoolResult};
pub use ipc::{IpcRegistry, MessageQueue, SemaphoreSet, ShmSegment};
pub use monitoring::init_tracing;
pub use process::{ChildLifecycle, ChildManager, JobRunner, LiveCount, ReapOutcome, RunSummary};
pub use signals::{install_shutdown_handler, ShutdownFlag};
