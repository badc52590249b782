/*!
 * Semaphore Sets
 * Cross-process mutual exclusion and signaling over System V semaphores
 *
 * Batch operations submit one `sembuf` per member in a single `semop`
 * call, so the kernel either applies every member or blocks the caller
 * without applying any.
 */

use crate::core::config::IpcConfig;
use crate::core::errors::{ObjectKind, PoolError, PoolResult};
use crate::ipc::core::keys;
use crate::ipc::core::{RawId, Sem, SemKey};
use nix::errno::Errno;
use std::mem;
use tracing::{debug, info, warn};

/// Handle to a System V semaphore set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreSet {
    key: SemKey,
    id: RawId,
    members: u16,
}

impl SemaphoreSet {
    /// Create a set of `members` semaphores, each starting at `initial`
    ///
    /// A set whose initialization fails is removed again before returning.
    pub fn create(config: &IpcConfig, members: u16, initial: u16) -> PoolResult<Self> {
        if members == 0 {
            return Err(PoolError::KernelOperationFailed {
                kind: ObjectKind::SemaphoreSet,
                op: "create",
                errno: Errno::EINVAL,
            });
        }

        let (key, id) = keys::allocate::<Sem, _>(config, |raw, flags| {
            Errno::result(unsafe { libc::semget(raw, libc::c_int::from(members), flags) })
        })?;
        let set = Self { key, id, members };

        for member in 0..members {
            if let Err(e) = set.set_value(member, initial) {
                warn!(%key, member, "Semaphore initialization failed, removing set");
                let _ = set.remove();
                return Err(e);
            }
        }

        info!(%key, id, members, initial, "Created semaphore set");
        Ok(set)
    }

    pub fn lookup(key: SemKey) -> PoolResult<Self> {
        let id = keys::lookup(key)?;
        let mut ds: libc::semid_ds = unsafe { mem::zeroed() };
        Errno::result(unsafe { libc::semctl(id, 0, libc::IPC_STAT, &mut ds as *mut libc::semid_ds) })
            .map_err(|errno| failed("stat", errno))?;
        Ok(Self {
            key,
            id,
            members: ds.sem_nsems as u16,
        })
    }

    pub fn destroy(key: SemKey) -> PoolResult<bool> {
        keys::destroy(key)
    }

    pub fn remove(&self) -> PoolResult<bool> {
        keys::remove_id(self.id, self.key)
    }

    pub fn key(&self) -> SemKey {
        self.key
    }

    pub fn members(&self) -> u16 {
        self.members
    }

    /// Decrement member `n`, blocking while it is zero
    pub fn lock(&self, n: u16) -> PoolResult<()> {
        self.check_member(n)?;
        self.apply(&mut [op(n, -1, 0)], "lock")
    }

    /// Increment member `n`
    pub fn unlock(&self, n: u16) -> PoolResult<()> {
        self.check_member(n)?;
        self.apply(&mut [op(n, 1, 0)], "unlock")
    }

    /// Decrement member `n` only if that would not block
    pub fn try_lock(&self, n: u16) -> PoolResult<()> {
        self.check_member(n)?;
        self.apply(&mut [op(n, -1, libc::IPC_NOWAIT as libc::c_short)], "lock")
    }

    /// Decrement every member in one atomic step
    pub fn lock_all(&self) -> PoolResult<()> {
        self.apply(&mut self.batch(-1, 0), "lock_all")
    }

    /// Increment every member in one atomic step
    pub fn unlock_all(&self) -> PoolResult<()> {
        self.apply(&mut self.batch(1, 0), "unlock_all")
    }

    /// Decrement every member, or none of them if any would block
    pub fn try_lock_all(&self) -> PoolResult<()> {
        self.apply(
            &mut self.batch(-1, libc::IPC_NOWAIT as libc::c_short),
            "lock_all",
        )
    }

    /// Current value of member `n`
    pub fn value(&self, n: u16) -> PoolResult<u16> {
        self.check_member(n)?;
        let value = Errno::result(unsafe { libc::semctl(self.id, libc::c_int::from(n), libc::GETVAL) })
            .map_err(|errno| failed("get_value", errno))?;
        Ok(value as u16)
    }

    fn set_value(&self, n: u16, value: u16) -> PoolResult<()> {
        Errno::result(unsafe {
            libc::semctl(
                self.id,
                libc::c_int::from(n),
                libc::SETVAL,
                libc::c_int::from(value),
            )
        })
        .map(drop)
        .map_err(|errno| failed("set_value", errno))
    }

    fn batch(&self, delta: libc::c_short, flags: libc::c_short) -> Vec<libc::sembuf> {
        (0..self.members).map(|n| op(n, delta, flags)).collect()
    }

    fn apply(&self, ops: &mut [libc::sembuf], name: &'static str) -> PoolResult<()> {
        match Errno::result(unsafe { libc::semop(self.id, ops.as_mut_ptr(), ops.len()) }) {
            Ok(_) => {
                debug!(key = %self.key, op = name, count = ops.len(), "Semaphore operation applied");
                Ok(())
            }
            Err(Errno::EAGAIN) => Err(PoolError::WouldBlock {
                kind: ObjectKind::SemaphoreSet,
                op: name,
            }),
            Err(errno) => Err(failed(name, errno)),
        }
    }

    fn check_member(&self, n: u16) -> PoolResult<()> {
        if n < self.members {
            Ok(())
        } else {
            Err(PoolError::OutOfRange {
                offset: n as usize,
                len: 1,
                size: self.members as usize,
            })
        }
    }
}

fn op(n: u16, delta: libc::c_short, flags: libc::c_short) -> libc::sembuf {
    libc::sembuf {
        sem_num: n,
        sem_op: delta,
        sem_flg: flags,
    }
}

fn failed(op: &'static str, errno: Errno) -> PoolError {
    PoolError::KernelOperationFailed {
        kind: ObjectKind::SemaphoreSet,
        op,
        errno,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config() -> IpcConfig {
        IpcConfig::default().with_base_key(0x5053_2000)
    }

    #[test]
    #[serial]
    fn test_zero_members_rejected() {
        assert!(SemaphoreSet::create(&config(), 0, 1).is_err());
    }

    #[test]
    #[serial]
    fn test_member_index_checked() {
        let set = SemaphoreSet::create(&config(), 2, 1).unwrap();
        assert!(matches!(set.lock(2), Err(PoolError::OutOfRange { .. })));
        set.remove().unwrap();
    }

    #[test]
    #[serial]
    fn test_try_lock_would_block_at_zero() {
        let set = SemaphoreSet::create(&config(), 1, 1).unwrap();
        set.try_lock(0).unwrap();
        assert_eq!(set.value(0).unwrap(), 0);
        assert!(matches!(set.try_lock(0), Err(PoolError::WouldBlock { .. })));
        set.unlock(0).unwrap();
        assert_eq!(set.value(0).unwrap(), 1);
        set.remove().unwrap();
    }

    #[test]
    #[serial]
    fn test_lookup_reports_member_count() {
        let set = SemaphoreSet::create(&config(), 3, 0).unwrap();
        let found = SemaphoreSet::lookup(set.key()).unwrap();
        assert_eq!(found.members(), 3);
        SemaphoreSet::destroy(set.key()).unwrap();
    }
}
