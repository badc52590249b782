/*!
 * IPC Module
 * System V inter-process communication: shared memory, semaphores and message queues
 */

pub mod core;
pub mod jobs;
pub mod queue;
pub mod registry;
pub mod sem;
pub mod shm;

// Re-export for convenience
pub use self::core::{destroy, IpcKey, IpcKind, Msg, MsgKey, Sem, SemKey, Shm, ShmKey};
pub use jobs::{load_job_list, load_job_lines, read_job_list, JobChain, JobListOptions};
pub use queue::{MessageQueue, QueueMessage};
pub use registry::{CleanupReport, IpcRegistry};
pub use sem::SemaphoreSet;
pub use shm::{ShmMapping, ShmSegment, ShmStats};
