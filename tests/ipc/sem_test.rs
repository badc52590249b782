/*!
 * Semaphore Tests
 * Member operations and all-or-nothing batches
 */

use pretty_assertions::assert_eq;
use procpool::core::{IpcConfig, PoolError};
use procpool::ipc::SemaphoreSet;
use serial_test::serial;
use std::sync::mpsc;
use std::time::Duration;

fn config() -> IpcConfig {
    IpcConfig::default().with_base_key(0x5054_2000)
}

fn values(set: &SemaphoreSet) -> Vec<u16> {
    (0..set.members()).map(|n| set.value(n).unwrap()).collect()
}

#[test]
#[serial]
fn test_batch_lock_is_all_or_nothing() {
    let set = SemaphoreSet::create(&config(), 3, 1).unwrap();
    set.lock(1).unwrap();
    assert_eq!(values(&set), vec![1, 0, 1]);

    let err = set.try_lock_all().unwrap_err();
    assert!(matches!(err, PoolError::WouldBlock { .. }));
    // No member moved
    assert_eq!(values(&set), vec![1, 0, 1]);

    set.unlock(1).unwrap();
    set.try_lock_all().unwrap();
    assert_eq!(values(&set), vec![0, 0, 0]);

    set.unlock_all().unwrap();
    assert_eq!(values(&set), vec![1, 1, 1]);

    set.lock_all().unwrap();
    assert_eq!(values(&set), vec![0, 0, 0]);

    set.remove().unwrap();
}

#[test]
#[serial]
fn test_blocked_lock_all_takes_nothing_until_member_freed() {
    let set = SemaphoreSet::create(&config(), 3, 1).unwrap();
    set.lock(1).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let waiter = std::thread::spawn(move || {
        set.lock_all().unwrap();
        done_tx.send(()).unwrap();
    });

    // Member 1 is zero, so the whole batch waits and the others stay at 1
    std::thread::sleep(Duration::from_millis(100));
    assert!(done_rx.try_recv().is_err());
    assert_eq!(values(&set), vec![1, 0, 1]);

    set.unlock(1).unwrap();
    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    waiter.join().unwrap();
    assert_eq!(values(&set), vec![0, 0, 0]);

    set.remove().unwrap();
}

#[test]
#[serial]
fn test_lookup_shares_state() {
    let set = SemaphoreSet::create(&config(), 2, 1).unwrap();
    let other = SemaphoreSet::lookup(set.key()).unwrap();
    assert_eq!(other.members(), 2);

    other.lock(0).unwrap();
    assert_eq!(set.value(0).unwrap(), 0);
    assert!(set.try_lock(0).is_err());

    assert!(SemaphoreSet::destroy(set.key()).unwrap());
    assert!(!SemaphoreSet::destroy(set.key()).unwrap());
    assert!(SemaphoreSet::lookup(set.key()).unwrap_err().is_expected_absence());
}

#[test]
#[serial]
fn test_member_index_checked() {
    let set = SemaphoreSet::create(&config(), 1, 0).unwrap();
    assert!(matches!(set.value(1), Err(PoolError::OutOfRange { .. })));
    assert!(matches!(set.lock(4), Err(PoolError::OutOfRange { .. })));
    set.remove().unwrap();
}
