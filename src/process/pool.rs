/*!
 * Job Runner
 * Runs a list of commands keeping at most N children alive
 */

use super::traits::ChildLifecycle;
use super::types::{LiveCount, ReapOutcome, Reaped};
use crate::core::errors::{PoolError, PoolResult, SerializableError};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Final state of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobOutcome {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SerializableError>,
}

impl JobOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }
}

/// Summary of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunSummary {
    pub launched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs never started because shutdown was requested
    pub skipped: usize,
    pub interrupted: bool,
    pub jobs: Vec<JobOutcome>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        !self.interrupted && self.failed == 0 && self.skipped == 0
    }
}

/// Drives a [`ChildLifecycle`] over a job list
pub struct JobRunner<L> {
    lifecycle: L,
    max_children: usize,
}

impl<L: ChildLifecycle> JobRunner<L> {
    pub fn new(lifecycle: L, max_children: usize) -> Self {
        Self {
            lifecycle,
            max_children: max_children.max(1),
        }
    }

    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut L {
        &mut self.lifecycle
    }

    pub fn into_lifecycle(self) -> L {
        self.lifecycle
    }

    /// Run `jobs` in order with bounded concurrency
    ///
    /// Jobs whose command is invalid or whose exec fails are recorded as
    /// failed and the run continues; kernel errors abort the run. When
    /// `shutdown` becomes true no further jobs are started, every running
    /// child is signaled and the run waits for them to exit.
    pub fn run(&mut self, jobs: &[String], shutdown: &AtomicBool) -> PoolResult<RunSummary> {
        let mut live = LiveCount::new();
        let mut summary = RunSummary::default();
        let mut running: HashMap<Pid, usize> = HashMap::new();
        let mut outcomes: Vec<JobOutcome> = jobs
            .iter()
            .map(|command| JobOutcome {
                command: command.clone(),
                pid: None,
                exit_code: None,
                signal: None,
                error: None,
            })
            .collect();

        let mut next = 0;
        'jobs: while next < jobs.len() {
            while live.get() >= self.max_children {
                if shutdown.load(Ordering::SeqCst) {
                    break 'jobs;
                }
                let poll = self.lifecycle.poll_interval();
                if let ReapOutcome::Reaped(r) = self.lifecycle.wait_reap_timeout(&mut live, poll)? {
                    record(&mut outcomes, &mut running, r);
                }
            }
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            let command = &jobs[next];
            match self.lifecycle.spawn(command, &mut live) {
                Ok(pid) => {
                    summary.launched += 1;
                    running.insert(pid, next);
                    outcomes[next].pid = Some(pid.as_raw());
                }
                Err(e @ (PoolError::InvalidCommand(_) | PoolError::ExecFailed { .. })) => {
                    warn!(job = next, error = %e, "Job could not be started");
                    outcomes[next].error = Some(SerializableError::from(&e));
                }
                Err(e) => return Err(e),
            }
            next += 1;
        }

        summary.skipped = jobs.len() - next;
        self.finish(&mut live, &mut outcomes, &mut running, shutdown)?;

        summary.interrupted = shutdown.load(Ordering::SeqCst);
        summary.succeeded = outcomes.iter().filter(|o| o.success()).count();
        summary.failed = outcomes.len() - summary.succeeded - summary.skipped;
        summary.jobs = outcomes;

        info!(
            launched = summary.launched,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            interrupted = summary.interrupted,
            "Run finished"
        );
        Ok(summary)
    }

    /// Wait out the children still running, terminating them on shutdown
    fn finish(
        &mut self,
        live: &mut LiveCount,
        outcomes: &mut [JobOutcome],
        running: &mut HashMap<Pid, usize>,
        shutdown: &AtomicBool,
    ) -> PoolResult<()> {
        let mut signaled = false;
        while live.get() > 0 {
            if !signaled && shutdown.load(Ordering::SeqCst) {
                self.lifecycle.kill_all()?;
                signaled = true;
            }
            let poll = self.lifecycle.poll_interval();
            match self.lifecycle.wait_reap_timeout(live, poll) {
                Ok(ReapOutcome::Reaped(r)) => record(outcomes, running, r),
                Ok(ReapOutcome::NoChange) => {}
                Err(e) if e.is_no_children() => {
                    warn!(live = live.get(), "No children left while some were still counted");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn record(outcomes: &mut [JobOutcome], running: &mut HashMap<Pid, usize>, reaped: Reaped) {
    let Some(idx) = running.remove(&reaped.pid) else {
        return;
    };
    let outcome = &mut outcomes[idx];
    outcome.exit_code = reaped.exit_code();
    outcome.signal = reaped.signal().map(|s| s.as_str().to_string());
    info!(
        pid = %reaped.pid,
        job = idx,
        exit_code = ?outcome.exit_code,
        signal = ?outcome.signal,
        "Job finished"
    );
}
