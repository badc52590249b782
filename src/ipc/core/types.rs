/*!
 * IPC Types
 * Typed keys for key-identified kernel objects
 */

use super::traits::IpcKind;
use crate::core::errors::ObjectKind;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Raw System V key type
pub type RawKey = libc::key_t;

/// Raw kernel identifier returned by `*get` calls
pub type RawId = libc::c_int;

/// Capability tag for shared memory segments
#[derive(Debug)]
pub enum Shm {}

/// Capability tag for semaphore sets
#[derive(Debug)]
pub enum Sem {}

/// Capability tag for message queues
#[derive(Debug)]
pub enum Msg {}

/// Key of a kernel object, tagged with the object kind
///
/// A `IpcKey<Sem>` cannot be handed to an operation expecting `IpcKey<Shm>`.
pub struct IpcKey<K> {
    raw: RawKey,
    _kind: PhantomData<fn() -> K>,
}

pub type ShmKey = IpcKey<Shm>;
pub type SemKey = IpcKey<Sem>;
pub type MsgKey = IpcKey<Msg>;

impl<K: IpcKind> IpcKey<K> {
    /// Wrap a key agreed on out-of-band. Keys must be positive.
    pub fn new(raw: RawKey) -> Option<Self> {
        (raw > 0).then(|| Self::from_raw(raw))
    }

    pub(crate) fn from_raw(raw: RawKey) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    pub fn raw(&self) -> RawKey {
        self.raw
    }

    pub fn kind(&self) -> ObjectKind {
        K::KIND
    }
}

impl<K> Clone for IpcKey<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for IpcKey<K> {}

impl<K> PartialEq for IpcKey<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K> Eq for IpcKey<K> {}

impl<K> Hash for IpcKey<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K: IpcKind> fmt::Debug for IpcKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpcKey")
            .field("kind", &K::KIND)
            .field("raw", &format_args!("{:#x}", self.raw))
            .finish()
    }
}

impl<K: IpcKind> fmt::Display for IpcKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:#x}", K::KIND, self.raw)
    }
}
