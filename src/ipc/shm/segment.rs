/*!
 * Shared Memory Segment
 * Segment handles and attached mappings
 */

use super::types::ShmStats;
use crate::core::config::IpcConfig;
use crate::core::errors::{ObjectKind, PoolError, PoolResult};
use crate::ipc::core::keys;
use crate::ipc::core::{RawId, Shm, ShmKey};
use nix::errno::Errno;
use std::ptr::{self, NonNull};
use tracing::{debug, info, warn};

/// Handle to a System V shared memory segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmSegment {
    key: ShmKey,
    id: RawId,
    size: usize,
}

impl ShmSegment {
    /// Allocate a new segment of `size` bytes under a fresh key
    pub fn create(config: &IpcConfig, size: usize) -> PoolResult<Self> {
        let (key, id) = keys::allocate::<Shm, _>(config, |raw, flags| {
            Errno::result(unsafe { libc::shmget(raw, size, flags) })
        })?;

        info!(%key, id, size, "Created shared memory segment");
        Ok(Self { key, id, size })
    }

    /// Resolve a key created elsewhere
    pub fn lookup(key: ShmKey) -> PoolResult<Self> {
        let id = keys::lookup(key)?;
        let ds = stat(id)?;
        Ok(Self {
            key,
            id,
            size: ds.shm_segsz as usize,
        })
    }

    /// Destroy the segment behind `key`; absent segments are not an error
    pub fn destroy(key: ShmKey) -> PoolResult<bool> {
        keys::destroy(key)
    }

    /// Mark this segment for removal. Existing mappings stay valid until detached.
    pub fn remove(&self) -> PoolResult<bool> {
        keys::remove_id(self.id, self.key)
    }

    pub fn key(&self) -> ShmKey {
        self.key
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Map the segment into this process
    pub fn attach(&self) -> PoolResult<ShmMapping> {
        let addr = Errno::result(unsafe { libc::shmat(self.id, ptr::null(), 0) }).map_err(
            |errno| PoolError::KernelOperationFailed {
                kind: ObjectKind::SharedMemory,
                op: "attach",
                errno,
            },
        )?;

        let base = NonNull::new(addr.cast::<u8>()).ok_or(PoolError::KernelOperationFailed {
            kind: ObjectKind::SharedMemory,
            op: "attach",
            errno: Errno::EFAULT,
        })?;

        debug!(key = %self.key, addr = ?base, "Attached shared memory segment");
        Ok(ShmMapping {
            key: self.key,
            base,
            size: self.size,
        })
    }

    pub fn stats(&self) -> PoolResult<ShmStats> {
        let ds = stat(self.id)?;
        Ok(ShmStats::new(
            self.key,
            ds.shm_segsz as usize,
            ds.shm_nattch as u64,
        ))
    }
}

fn stat(id: RawId) -> PoolResult<libc::shmid_ds> {
    let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
    Errno::result(unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) }).map_err(|errno| {
        PoolError::KernelOperationFailed {
            kind: ObjectKind::SharedMemory,
            op: "stat",
            errno,
        }
    })?;
    Ok(ds)
}

/// A segment mapped into this address space
///
/// Contents may change under us at any time from other processes; access is
/// by copy only and coordination is left to a semaphore discipline.
/// Dropping the mapping detaches it.
#[derive(Debug)]
pub struct ShmMapping {
    key: ShmKey,
    base: NonNull<u8>,
    size: usize,
}

impl ShmMapping {
    pub fn key(&self) -> ShmKey {
        self.key
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Copy `data` into the segment at `offset`
    pub fn write(&mut self, offset: usize, data: &[u8]) -> PoolResult<()> {
        self.check_range(offset, data.len())?;
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.base.as_ptr().add(offset), data.len());
        }
        Ok(())
    }

    /// Copy `len` bytes out of the segment starting at `offset`
    pub fn read(&self, offset: usize, len: usize) -> PoolResult<Vec<u8>> {
        self.check_range(offset, len)?;
        let mut out = vec![0u8; len];
        unsafe {
            ptr::copy_nonoverlapping(self.base.as_ptr().add(offset), out.as_mut_ptr(), len);
        }
        Ok(out)
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) -> PoolResult<()> {
        self.write(offset, &value.to_ne_bytes())
    }

    pub fn read_u32(&self, offset: usize) -> PoolResult<u32> {
        let bytes = self.read(offset, 4)?;
        Ok(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Detach, reporting kernel failures
    pub fn detach(self) -> PoolResult<()> {
        let base = self.base;
        let key = self.key;
        std::mem::forget(self);
        detach_raw(base).map_err(|errno| PoolError::KernelOperationFailed {
            kind: ObjectKind::SharedMemory,
            op: "detach",
            errno,
        })?;
        debug!(%key, "Detached shared memory segment");
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> PoolResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(PoolError::OutOfRange {
                offset,
                len,
                size: self.size,
            }),
        }
    }
}

impl Drop for ShmMapping {
    fn drop(&mut self) {
        if let Err(errno) = detach_raw(self.base) {
            warn!(key = %self.key, %errno, "Failed to detach shared memory on drop");
        }
    }
}

fn detach_raw(base: NonNull<u8>) -> Result<(), Errno> {
    Errno::result(unsafe { libc::shmdt(base.as_ptr().cast::<libc::c_void>()) }).map(drop)
}
