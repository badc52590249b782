/*!
 * Process Traits
 * Child lifecycle abstraction used by the job runner
 */

use super::types::{KillSummary, LiveCount, ReapOutcome, Reaped};
use crate::core::config::DEFAULT_POLL_INTERVAL;
use crate::core::errors::PoolResult;
use nix::unistd::Pid;
use std::time::{Duration, Instant};

/// Spawn, reap and bulk-terminate children
pub trait ChildLifecycle {
    /// Fork and exec `command`, incrementing `live` on success
    fn spawn(&mut self, command: &str, live: &mut LiveCount) -> PoolResult<Pid>;

    /// Collect any terminated child without blocking
    fn try_reap_one(&mut self, live: &mut LiveCount) -> PoolResult<ReapOutcome>;

    /// Block until any child terminates
    fn wait_reap_one(&mut self, live: &mut LiveCount) -> PoolResult<Reaped>;

    /// Signal every registered child
    fn kill_all(&mut self) -> PoolResult<KillSummary>;

    /// Sleep between polls in [`ChildLifecycle::wait_reap_timeout`]
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Poll [`ChildLifecycle::try_reap_one`] until a child terminates or
    /// `timeout` elapses
    fn wait_reap_timeout(
        &mut self,
        live: &mut LiveCount,
        timeout: Duration,
    ) -> PoolResult<ReapOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            if let outcome @ ReapOutcome::Reaped(_) = self.try_reap_one(live)? {
                return Ok(outcome);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(ReapOutcome::NoChange);
            }
            std::thread::sleep(self.poll_interval().min(deadline - now));
        }
    }
}
