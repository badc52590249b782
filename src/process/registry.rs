/*!
 * Child Registry
 * PIDs spawned by this process and not yet reaped
 */

use nix::unistd::Pid;

/// Insertion-ordered set of live child PIDs
///
/// Entries leave only when a reap confirms termination; signaling a child
/// does not remove it.
#[derive(Debug, Clone, Default)]
pub struct ChildRegistry {
    pids: Vec<Pid>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly forked child. Returns false if it was already present.
    pub fn insert(&mut self, pid: Pid) -> bool {
        if self.contains(pid) {
            return false;
        }
        self.pids.push(pid);
        true
    }

    /// Forget a reaped child. Returns false if it was never registered.
    pub fn remove(&mut self, pid: Pid) -> bool {
        match self.pids.iter().position(|p| *p == pid) {
            Some(idx) => {
                self.pids.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.pids.iter().copied()
    }

    pub(crate) fn clear(&mut self) -> Vec<Pid> {
        std::mem::take(&mut self.pids)
    }
}
