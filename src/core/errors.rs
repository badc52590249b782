/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use nix::errno::Errno;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kernel object category a key or handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    SharedMemory,
    SemaphoreSet,
    MessageQueue,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::SharedMemory => "shared memory segment",
            ObjectKind::SemaphoreSet => "semaphore set",
            ObjectKind::MessageQueue => "message queue",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a [`PoolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Resource exhaustion or a failing kernel call
    Kernel,
    /// The target is already gone; callers usually tolerate this
    ExpectedAbsence,
    /// The caller asked for something that cannot succeed
    Misuse,
}

/// Errors raised by the lifecycle manager and the IPC layer
#[derive(Error, Debug, Diagnostic)]
pub enum PoolError {
    #[error("Invalid command: {0}")]
    #[diagnostic(
        code(process::invalid_command),
        help("Commands are whitespace-separated fields and must contain at least one token without NUL bytes.")
    )]
    InvalidCommand(String),

    #[error("fork() failed: {0}")]
    #[diagnostic(
        code(process::fork_failed),
        help("The process table or memory may be exhausted. Check ulimit -u and system load.")
    )]
    ForkFailed(Errno),

    #[error("exec of '{command}' failed: {errno}")]
    #[diagnostic(
        code(process::exec_failed),
        help("Verify the program exists on PATH and is executable.")
    )]
    ExecFailed { command: String, errno: Errno },

    #[error("waitpid() failed: {0}")]
    #[diagnostic(
        code(process::wait_failed),
        help("ECHILD means no children remain to be reaped.")
    )]
    WaitFailed(Errno),

    #[error("Failed to signal PID {pid}: {errno}")]
    #[diagnostic(
        code(process::signal_failed),
        help("The process may belong to another user. Only direct children should be signaled.")
    )]
    SignalFailed { pid: Pid, errno: Errno },

    #[error("Failed to install signal handlers: {0}")]
    #[diagnostic(code(process::signal_setup_failed))]
    SignalSetup(String),

    #[error("{kind} with key {key:#x} is unavailable: {errno}")]
    #[diagnostic(
        code(ipc::unavailable),
        help("The key is unknown or the object was removed. Confirm the creator is still running and the key was agreed on.")
    )]
    KernelObjectUnavailable {
        kind: ObjectKind,
        key: i32,
        errno: Errno,
    },

    #[error("{op} on {kind} failed: {errno}")]
    #[diagnostic(
        code(ipc::operation_failed),
        help("Check kernel IPC limits (ipcs -l) and object permissions.")
    )]
    KernelOperationFailed {
        kind: ObjectKind,
        op: &'static str,
        errno: Errno,
    },

    #[error("{op} on {kind} would block")]
    #[diagnostic(code(ipc::would_block))]
    WouldBlock { kind: ObjectKind, op: &'static str },

    #[error("Range out of bounds: offset {offset}, length {len}, size {size}")]
    #[diagnostic(code(ipc::out_of_range))]
    OutOfRange { offset: usize, len: usize, size: usize },

    #[error("Line {line} is {len} bytes, slot width is {width}")]
    #[diagnostic(
        code(jobs::line_too_long),
        help("Raise the line width (PROCPOOL_LINE_WIDTH) or shorten the job.")
    )]
    LineTooLong { line: usize, len: usize, width: usize },

    #[error("Invalid segment layout: {0}")]
    #[diagnostic(code(jobs::invalid_layout))]
    InvalidLayout(String),

    #[error("No free key for a new {kind} starting at {base:#x}")]
    #[diagnostic(
        code(ipc::key_space_exhausted),
        help("Remove stale objects with ipcrm or pick another base key (PROCPOOL_IPC_BASE_KEY).")
    )]
    KeySpaceExhausted { kind: ObjectKind, base: i32 },

    #[error("I/O error: {0}")]
    #[diagnostic(code(pool::io_error))]
    Io(#[from] std::io::Error),
}

impl PoolError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::InvalidCommand(_)
            | PoolError::OutOfRange { .. }
            | PoolError::LineTooLong { .. } => ErrorKind::Misuse,
            PoolError::WaitFailed(Errno::ECHILD) => ErrorKind::Misuse,
            _ if self.is_expected_absence() => ErrorKind::ExpectedAbsence,
            _ => ErrorKind::Kernel,
        }
    }

    /// True when the error only says the target no longer exists
    pub fn is_expected_absence(&self) -> bool {
        match self {
            PoolError::SignalFailed { errno, .. } => *errno == Errno::ESRCH,
            PoolError::KernelObjectUnavailable { errno, .. } => {
                matches!(errno, Errno::ENOENT | Errno::EIDRM)
            }
            _ => false,
        }
    }

    /// True when a reap failed because there are no children left
    pub fn is_no_children(&self) -> bool {
        matches!(self, PoolError::WaitFailed(Errno::ECHILD))
    }
}

/// Result type for pool operations
///
/// # Must Use
/// Pool operations touch kernel resources and must be handled to prevent leaks
pub type PoolResult<T> = std::result::Result<T, PoolError>;

/// Serializable error representation for run summaries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SerializableError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PoolError> for SerializableError {
    fn from(err: &PoolError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
