/*!
 * Child Manager
 * Fork/exec of worker children, reaping and bulk termination
 */

use super::argv::{tokenize, ExecArgv};
use super::registry::ChildRegistry;
use super::traits::ChildLifecycle;
use super::types::{KillSummary, LiveCount, ReapOutcome, Reaped, SignalOutcome, EXEC_FAILURE_STATUS};
use crate::core::config::ReapConfig;
use crate::core::errors::{PoolError, PoolResult};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use std::io::{ErrorKind, Read};
use std::os::unix::net::UnixStream;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Wait target meaning "any child"
const ANY_CHILD: Option<Pid> = None;

/// Owns the registry of spawned children
///
/// Single-threaded by contract: the registry is plain mutable state and every
/// mutating operation takes `&mut self`. Share across threads only behind
/// external synchronization.
#[derive(Debug, Default)]
pub struct ChildManager {
    registry: ChildRegistry,
    config: ReapConfig,
}

impl ChildManager {
    pub fn new(config: ReapConfig) -> Self {
        info!(
            signal = ?config.termination_signal,
            poll_ms = config.poll_interval.as_millis() as u64,
            "Child manager initialized"
        );
        Self {
            registry: ChildRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &ReapConfig {
        &self.config
    }

    /// PIDs spawned and not yet reaped, in spawn order
    pub fn registered(&self) -> Vec<Pid> {
        self.registry.iter().collect()
    }

    pub fn is_registered(&self, pid: Pid) -> bool {
        self.registry.contains(pid)
    }

    /// Number of registered children
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Send `signal` to one process
    ///
    /// A target that no longer exists is reported as
    /// [`SignalOutcome::AlreadyGone`], not as an error.
    pub fn signal(&self, pid: Pid, signal: Signal) -> PoolResult<SignalOutcome> {
        match kill(pid, signal) {
            Ok(()) => Ok(SignalOutcome::Delivered),
            Err(Errno::ESRCH) => Ok(SignalOutcome::AlreadyGone),
            Err(errno) => Err(PoolError::SignalFailed { pid, errno }),
        }
    }

    /// Reap every registered child, blocking as needed
    ///
    /// Stops early if the kernel reports no children left, in which case the
    /// remaining registry entries are dropped.
    pub fn drain(&mut self, live: &mut LiveCount) -> PoolResult<Vec<Reaped>> {
        let mut reaped = Vec::with_capacity(self.registry.len());
        while !self.registry.is_empty() {
            match self.wait_reap_one(live) {
                Ok(r) => reaped.push(r),
                Err(e) if e.is_no_children() => {
                    let stale = self.registry.clear();
                    warn!(count = stale.len(), "No children left, dropping stale registry entries");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reaped)
    }

    fn settle(&mut self, pid: Pid, status: WaitStatus, live: &mut LiveCount) -> Reaped {
        if self.registry.remove(pid) {
            live.decrement();
            debug!(%pid, ?status, live = live.get(), "Reaped child");
        } else {
            warn!(%pid, ?status, "Reaped a child this manager did not spawn");
        }
        Reaped { pid, status }
    }

    /// Parent side of a fork: learn whether exec succeeded
    ///
    /// The channel is close-on-exec, so EOF without data means the child
    /// image was replaced. Four bytes are the errno of a failed exec.
    fn await_exec(&self, mut channel: UnixStream) -> Option<Errno> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match channel.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "Could not read exec status from child, assuming it started");
                    return None;
                }
            }
        }
        (filled == buf.len()).then(|| Errno::from_raw(i32::from_ne_bytes(buf)))
    }
}

impl ChildLifecycle for ChildManager {
    #[instrument(skip(self, live), fields(live = live.get()))]
    fn spawn(&mut self, command: &str, live: &mut LiveCount) -> PoolResult<Pid> {
        let argv = tokenize(command);
        let exec = argv.to_exec()?;
        let failure_note = format!("procpool: exec of '{}' failed: ", argv);

        let (parent_end, child_end) = UnixStream::pair()?;

        match unsafe { fork() } {
            Err(errno) => {
                error!(%errno, "fork() failed");
                Err(PoolError::ForkFailed(errno))
            }
            Ok(ForkResult::Child) => exec_child(&exec, &child_end, failure_note.as_bytes()),
            Ok(ForkResult::Parent { child }) => {
                drop(child_end);

                if let Some(errno) = self.await_exec(parent_end) {
                    // The child has already exited; collect it so it never lingers.
                    if let Err(wait_err) = waitpid(child, None) {
                        warn!(%child, %wait_err, "Could not reap child after failed exec");
                    }
                    warn!(%child, %errno, "exec failed in child");
                    return Err(PoolError::ExecFailed {
                        command: argv.to_string(),
                        errno,
                    });
                }

                self.registry.insert(child);
                live.increment();
                info!(pid = %child, live = live.get(), "Spawned child");
                Ok(child)
            }
        }
    }

    fn try_reap_one(&mut self, live: &mut LiveCount) -> PoolResult<ReapOutcome> {
        match waitpid(ANY_CHILD, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(ReapOutcome::NoChange),
            Ok(status) => match status.pid() {
                Some(pid) => Ok(ReapOutcome::Reaped(self.settle(pid, status, live))),
                None => Ok(ReapOutcome::NoChange),
            },
            Err(errno) => Err(PoolError::WaitFailed(errno)),
        }
    }

    fn wait_reap_one(&mut self, live: &mut LiveCount) -> PoolResult<Reaped> {
        loop {
            let status = waitpid(ANY_CHILD, None).map_err(PoolError::WaitFailed)?;
            if let Some(pid) = status.pid() {
                return Ok(self.settle(pid, status, live));
            }
        }
    }

    fn kill_all(&mut self) -> PoolResult<KillSummary> {
        let signal = self.config.termination_signal;
        let mut summary = KillSummary::default();
        for pid in self.registry.iter() {
            let outcome = self.signal(pid, signal)?;
            debug!(%pid, ?outcome, "Termination signal sent");
            summary.record(outcome);
        }
        info!(
            delivered = summary.delivered,
            already_gone = summary.already_gone,
            "Signaled all children"
        );
        Ok(summary)
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }
}

/// Child side of a fork: replace the process image or exit
///
/// Runs between fork and exec, so it only makes raw system calls on
/// buffers prepared by the parent.
fn exec_child(exec: &ExecArgv, channel: &UnixStream, failure_note: &[u8]) -> ! {
    unsafe {
        libc::execvp(exec.program().as_ptr(), exec.as_ptr());
    }

    let errno = Errno::last();
    let _ = nix::unistd::write(channel, &(errno as i32).to_ne_bytes());
    let stderr = std::io::stderr();
    let _ = nix::unistd::write(&stderr, failure_note);
    let _ = nix::unistd::write(&stderr, errno.desc().as_bytes());
    let _ = nix::unistd::write(&stderr, b"\n");

    unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
}
