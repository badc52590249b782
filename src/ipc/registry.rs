/*!
 * IPC Registry
 * Tracks every kernel object this process created and tears them down at shutdown
 */

use super::core::{destroy, IpcKey, IpcKind, MsgKey, SemKey, ShmKey};
use super::queue::MessageQueue;
use super::sem::SemaphoreSet;
use super::shm::ShmSegment;
use crate::core::config::IpcConfig;
use crate::core::errors::PoolResult;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CleanupReport {
    /// Objects removed by this pass
    pub destroyed: usize,
    /// Objects that were already gone
    pub absent: usize,
    /// Objects the kernel refused to remove
    pub failed: usize,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Owner-side bookkeeping of created kernel objects
///
/// Objects created through the registry are remembered by key so that a
/// single [`IpcRegistry::cleanup`] call at shutdown can remove them all.
#[derive(Debug, Default)]
pub struct IpcRegistry {
    config: IpcConfig,
    segments: Vec<ShmKey>,
    semaphores: Vec<SemKey>,
    queues: Vec<MsgKey>,
}

impl IpcRegistry {
    pub fn new(config: IpcConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    pub fn create_segment(&mut self, size: usize) -> PoolResult<ShmSegment> {
        let segment = ShmSegment::create(&self.config, size)?;
        self.segments.push(segment.key());
        Ok(segment)
    }

    pub fn create_semaphores(&mut self, members: u16, initial: u16) -> PoolResult<SemaphoreSet> {
        let set = SemaphoreSet::create(&self.config, members, initial)?;
        self.semaphores.push(set.key());
        Ok(set)
    }

    pub fn create_queue(&mut self) -> PoolResult<MessageQueue> {
        let queue = MessageQueue::create(&self.config)?;
        self.queues.push(queue.key());
        Ok(queue)
    }

    /// Number of objects still awaiting cleanup
    pub fn len(&self) -> usize {
        self.segments.len() + self.semaphores.len() + self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort removal of every tracked object
    ///
    /// Never fails: objects already destroyed or never fully created are
    /// counted as absent, kernel refusals are logged and counted. Calling it
    /// again is a no-op.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        drain_into(&mut self.segments, &mut report);
        drain_into(&mut self.semaphores, &mut report);
        drain_into(&mut self.queues, &mut report);

        if report.destroyed + report.absent + report.failed > 0 {
            info!(
                destroyed = report.destroyed,
                absent = report.absent,
                failed = report.failed,
                "IPC cleanup complete"
            );
        }
        report
    }
}

fn drain_into<K: IpcKind>(keys: &mut Vec<IpcKey<K>>, report: &mut CleanupReport) {
    for key in keys.drain(..) {
        match destroy(key) {
            Ok(true) => report.destroyed += 1,
            Ok(false) => report.absent += 1,
            Err(e) => {
                warn!(%key, error = %e, "Failed to destroy kernel object during cleanup");
                report.failed += 1;
            }
        }
    }
}
