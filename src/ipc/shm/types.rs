/*!
 * Shared Memory Types
 * Common types for shared memory segments
 */

use crate::ipc::core::ShmKey;
use serde::{Deserialize, Serialize};

/// Snapshot of a segment's kernel bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ShmStats {
    pub key: i32,
    pub size: usize,
    pub attach_count: u64,
}

impl ShmStats {
    pub(super) fn new(key: ShmKey, size: usize, attach_count: u64) -> Self {
        Self {
            key: key.raw(),
            size,
            attach_count,
        }
    }
}
