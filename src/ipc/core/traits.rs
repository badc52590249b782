/*!
 * IPC Traits
 * Per-kind kernel bindings shared by the generic key operations
 */

use super::types::{Msg, RawId, RawKey, Sem, Shm};
use crate::core::errors::ObjectKind;
use nix::errno::Errno;
use std::ptr;

/// A kind of System V object
///
/// Supplies the two calls every kind needs for lookup and teardown;
/// creation differs per kind and lives with each handle type.
pub trait IpcKind: 'static {
    const KIND: ObjectKind;

    /// Resolve an existing key to its kernel id
    fn lookup_id(key: RawKey) -> Result<RawId, Errno>;

    /// Mark the object for removal
    fn remove(id: RawId) -> Result<(), Errno>;
}

impl IpcKind for Shm {
    const KIND: ObjectKind = ObjectKind::SharedMemory;

    fn lookup_id(key: RawKey) -> Result<RawId, Errno> {
        Errno::result(unsafe { libc::shmget(key, 0, 0) })
    }

    fn remove(id: RawId) -> Result<(), Errno> {
        Errno::result(unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) }).map(drop)
    }
}

impl IpcKind for Sem {
    const KIND: ObjectKind = ObjectKind::SemaphoreSet;

    fn lookup_id(key: RawKey) -> Result<RawId, Errno> {
        Errno::result(unsafe { libc::semget(key, 0, 0) })
    }

    fn remove(id: RawId) -> Result<(), Errno> {
        Errno::result(unsafe { libc::semctl(id, 0, libc::IPC_RMID) }).map(drop)
    }
}

impl IpcKind for Msg {
    const KIND: ObjectKind = ObjectKind::MessageQueue;

    fn lookup_id(key: RawKey) -> Result<RawId, Errno> {
        Errno::result(unsafe { libc::msgget(key, 0) })
    }

    fn remove(id: RawId) -> Result<(), Errno> {
        Errno::result(unsafe { libc::msgctl(id, libc::IPC_RMID, ptr::null_mut()) }).map(drop)
    }
}
