/*!
 * IPC Cleanup Tests
 * Registry teardown with objects already removed elsewhere
 */

use pretty_assertions::assert_eq;
use procpool::core::IpcConfig;
use procpool::ipc::{IpcRegistry, MessageQueue, SemaphoreSet, ShmSegment};
use serial_test::serial;

#[test]
#[serial]
fn test_cleanup_tolerates_removed_objects() {
    let mut registry = IpcRegistry::new(IpcConfig::default().with_base_key(0x5054_6000));
    let segment = registry.create_segment(256).unwrap();
    let set = registry.create_semaphores(1, 1).unwrap();
    let queue = registry.create_queue().unwrap();

    // A child already tore the queue down
    MessageQueue::destroy(queue.key()).unwrap();

    let report = registry.cleanup();
    assert_eq!(report.destroyed, 2);
    assert_eq!(report.absent, 1);
    assert_eq!(report.failed, 0);
    assert!(report.is_clean());

    assert!(ShmSegment::lookup(segment.key()).is_err());
    assert!(SemaphoreSet::lookup(set.key()).is_err());

    let again = registry.cleanup();
    assert_eq!(again.destroyed + again.absent + again.failed, 0);
}
