/*!
 * Process Types
 * Common types for the child lifecycle manager
 */

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Exit status a child uses when exec fails
pub const EXEC_FAILURE_STATUS: i32 = 127;

/// Caller-owned count of children believed to be running
///
/// Incremented on every successful spawn and decremented on every reap of a
/// child that was spawned through the manager. It never goes below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LiveCount(usize);

impl LiveCount {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn get(&self) -> usize {
        self.0
    }

    pub fn increment(&mut self) {
        self.0 += 1;
    }

    /// Returns false if the count was already zero
    pub fn decrement(&mut self) -> bool {
        match self.0.checked_sub(1) {
            Some(n) => {
                self.0 = n;
                true
            }
            None => {
                warn!("Live count decrement requested at zero, ignoring");
                false
            }
        }
    }
}

impl From<usize> for LiveCount {
    fn from(count: usize) -> Self {
        Self(count)
    }
}

/// A child whose termination was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
    pub pid: Pid,
    pub status: WaitStatus,
}

impl Reaped {
    /// Exit code when the child exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            WaitStatus::Exited(_, code) => Some(code),
            _ => None,
        }
    }

    /// Signal that terminated the child, if any
    pub fn signal(&self) -> Option<Signal> {
        match self.status {
            WaitStatus::Signaled(_, signal, _) => Some(signal),
            _ => None,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code() == Some(0)
    }
}

/// Result of a non-blocking reap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// A child terminated and was collected
    Reaped(Reaped),
    /// No child has terminated yet
    NoChange,
}

impl ReapOutcome {
    pub fn is_no_change(&self) -> bool {
        matches!(self, ReapOutcome::NoChange)
    }

    pub fn reaped(self) -> Option<Reaped> {
        match self {
            ReapOutcome::Reaped(r) => Some(r),
            ReapOutcome::NoChange => None,
        }
    }
}

/// Result of signaling one process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOutcome {
    Delivered,
    /// The target no longer exists
    AlreadyGone,
}

/// Result of a bulk termination pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KillSummary {
    pub delivered: usize,
    pub already_gone: usize,
}

impl KillSummary {
    pub fn record(&mut self, outcome: SignalOutcome) {
        match outcome {
            SignalOutcome::Delivered => self.delivered += 1,
            SignalOutcome::AlreadyGone => self.already_gone += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.delivered + self.already_gone
    }
}
