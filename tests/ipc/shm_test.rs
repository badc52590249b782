/*!
 * Shared Memory Tests
 * Segment lifecycle across create, lookup, detach and destroy
 */

use pretty_assertions::assert_eq;
use procpool::core::{IpcConfig, PoolError};
use procpool::ipc::ShmSegment;
use serial_test::serial;

fn config() -> IpcConfig {
    IpcConfig::default().with_base_key(0x5054_1000)
}

#[test]
#[serial]
fn test_create_lookup_destroy_cycle() {
    let segment = ShmSegment::create(&config(), 4096).unwrap();
    let key = segment.key();

    let mut writer = segment.attach().unwrap();
    writer.write(100, b"shared job data").unwrap();

    // A second handle found by key sees the same bytes
    let found = ShmSegment::lookup(key).unwrap();
    assert_eq!(found.size(), 4096);
    let reader = found.attach().unwrap();
    assert_eq!(reader.read(100, 15).unwrap(), b"shared job data".to_vec());
    assert_eq!(segment.stats().unwrap().attach_count, 2);

    reader.detach().unwrap();
    writer.detach().unwrap();

    assert!(ShmSegment::destroy(key).unwrap());
    let err = ShmSegment::lookup(key).unwrap_err();
    assert!(matches!(err, PoolError::KernelObjectUnavailable { .. }));
    assert!(err.is_expected_absence());

    // Destroying again is a no-op
    assert!(!ShmSegment::destroy(key).unwrap());
}

#[test]
#[serial]
fn test_mapping_outlives_removal_until_detached() {
    let segment = ShmSegment::create(&config(), 128).unwrap();
    let mut mapping = segment.attach().unwrap();
    mapping.write(0, b"still here").unwrap();

    assert!(segment.remove().unwrap());
    assert_eq!(mapping.read(0, 10).unwrap(), b"still here".to_vec());

    mapping.detach().unwrap();
    assert!(!ShmSegment::destroy(segment.key()).unwrap());
}

#[test]
#[serial]
fn test_created_keys_are_distinct() {
    let a = ShmSegment::create(&config(), 32).unwrap();
    let b = ShmSegment::create(&config(), 32).unwrap();
    assert_ne!(a.key(), b.key());

    a.remove().unwrap();
    b.remove().unwrap();
}
