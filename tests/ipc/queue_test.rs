/*!
 * Message Queue Tests
 * Handshake tokens and typed messages
 */

use pretty_assertions::assert_eq;
use procpool::core::{IpcConfig, PoolError};
use procpool::ipc::MessageQueue;
use serial_test::serial;
use std::time::Duration;

fn config() -> IpcConfig {
    IpcConfig::default().with_base_key(0x5054_3000)
}

#[test]
#[serial]
fn test_handshake_tokens() {
    let queue = MessageQueue::create(&config()).unwrap();
    assert!(!queue.try_receive().unwrap());

    queue.send().unwrap();
    queue.send().unwrap();
    assert_eq!(queue.pending().unwrap(), 2);

    queue.receive().unwrap();
    assert!(queue.try_receive().unwrap());
    assert!(!queue.try_receive().unwrap());

    queue.remove().unwrap();
}

#[test]
#[serial]
fn test_receive_blocks_until_sent() {
    let queue = MessageQueue::create(&config()).unwrap();
    let sender = MessageQueue::lookup(queue.key()).unwrap();

    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        sender.send_bytes(9, b"done").unwrap();
    });

    let message = queue.receive_bytes(9).unwrap();
    handle.join().unwrap();
    assert_eq!(message.mtype, 9);
    assert_eq!(message.body, b"done".to_vec());

    assert!(MessageQueue::destroy(queue.key()).unwrap());
}

#[test]
#[serial]
fn test_typed_messages_are_selected_by_type() {
    let queue = MessageQueue::create(&config()).unwrap();
    queue.send_bytes(3, b"three").unwrap();
    queue.send_bytes(7, b"seven").unwrap();

    assert_eq!(queue.receive_bytes(7).unwrap().body, b"seven".to_vec());
    let any = queue.receive_bytes(0).unwrap();
    assert_eq!(any.mtype, 3);
    assert_eq!(any.body, b"three".to_vec());

    queue.remove().unwrap();
}

#[test]
#[serial]
fn test_removed_queue_cannot_be_found() {
    let queue = MessageQueue::create(&config()).unwrap();
    queue.send().unwrap();

    assert!(queue.remove().unwrap());
    let err = MessageQueue::lookup(queue.key()).unwrap_err();
    assert!(err.is_expected_absence());
    assert!(matches!(queue.try_receive(), Err(PoolError::KernelOperationFailed { .. })));
}
