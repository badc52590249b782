/*!
 * Key Operations
 * Key allocation, lookup and idempotent teardown for any object kind
 */

use super::traits::IpcKind;
use super::types::{IpcKey, RawId, RawKey};
use crate::core::config::IpcConfig;
use crate::core::errors::{PoolError, PoolResult};
use nix::errno::Errno;
use tracing::{debug, info};

/// Create a fresh object by probing keys upward from the configured base
///
/// `get` receives the candidate key and the creation flags
/// (`IPC_CREAT | IPC_EXCL | mode`). Keys already taken are skipped.
pub(crate) fn allocate<K, F>(config: &IpcConfig, mut get: F) -> PoolResult<(IpcKey<K>, RawId)>
where
    K: IpcKind,
    F: FnMut(RawKey, libc::c_int) -> Result<RawId, Errno>,
{
    let flags = libc::IPC_CREAT | libc::IPC_EXCL | config.mode;

    for offset in 0..config.search_limit {
        let raw = config.base_key.wrapping_add(offset as i32);
        if raw <= 0 {
            continue;
        }
        match get(raw, flags) {
            Ok(id) => {
                debug!(kind = %K::KIND, key = raw, id, "Allocated kernel object");
                return Ok((IpcKey::from_raw(raw), id));
            }
            Err(Errno::EEXIST) => continue,
            Err(errno) => {
                return Err(PoolError::KernelOperationFailed {
                    kind: K::KIND,
                    op: "create",
                    errno,
                })
            }
        }
    }

    Err(PoolError::KeySpaceExhausted {
        kind: K::KIND,
        base: config.base_key,
    })
}

/// Resolve a key to its kernel id
pub(crate) fn lookup<K: IpcKind>(key: IpcKey<K>) -> PoolResult<RawId> {
    K::lookup_id(key.raw()).map_err(|errno| PoolError::KernelObjectUnavailable {
        kind: K::KIND,
        key: key.raw(),
        errno,
    })
}

/// Remove the object behind `key`
///
/// Returns `Ok(false)` when nothing was there to remove, so teardown can
/// run any number of times.
pub fn destroy<K: IpcKind>(key: IpcKey<K>) -> PoolResult<bool> {
    let id = match K::lookup_id(key.raw()) {
        Ok(id) => id,
        Err(Errno::ENOENT | Errno::EIDRM) => {
            debug!(%key, "Destroy skipped, object absent");
            return Ok(false);
        }
        Err(errno) => {
            return Err(PoolError::KernelObjectUnavailable {
                kind: K::KIND,
                key: key.raw(),
                errno,
            })
        }
    };
    remove_id::<K>(id, key)
}

/// Remove by kernel id, tolerating an object that vanished meanwhile
pub(crate) fn remove_id<K: IpcKind>(id: RawId, key: IpcKey<K>) -> PoolResult<bool> {
    match K::remove(id) {
        Ok(()) => {
            info!(%key, id, "Destroyed kernel object");
            Ok(true)
        }
        Err(Errno::EINVAL | Errno::EIDRM) => Ok(false),
        Err(errno) => Err(PoolError::KernelOperationFailed {
            kind: K::KIND,
            op: "destroy",
            errno,
        }),
    }
}
