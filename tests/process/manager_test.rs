/*!
 * Child Manager Tests
 * Fork/exec, reaping and termination against real children
 */

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use pretty_assertions::assert_eq;
use procpool::core::{PoolError, ReapConfig};
use procpool::process::{
    ChildLifecycle, ChildManager, LiveCount, ReapOutcome, SignalOutcome, EXEC_FAILURE_STATUS,
};
use serial_test::serial;
use std::time::Duration;

fn manager() -> ChildManager {
    ChildManager::new(ReapConfig {
        poll_interval: Duration::from_millis(5),
        ..ReapConfig::default()
    })
}

#[test]
#[serial]
fn test_three_children_reaped_down_to_zero() {
    let mut mgr = manager();
    let mut live = LiveCount::new();

    for _ in 0..3 {
        mgr.spawn("true", &mut live).unwrap();
    }
    assert_eq!(live.get(), 3);
    assert_eq!(mgr.len(), 3);

    for expected in [2, 1, 0] {
        let reaped = mgr.wait_reap_one(&mut live).unwrap();
        assert!(reaped.success());
        assert_eq!(live.get(), expected);
    }

    let err = mgr.wait_reap_one(&mut live).unwrap_err();
    assert!(err.is_no_children());
    assert_eq!(live.get(), 0);
    assert!(mgr.is_empty());
}

#[test]
#[serial]
fn test_try_reap_without_exits_is_noop() {
    let mut mgr = manager();
    let mut live = LiveCount::new();
    let pid = mgr.spawn("sleep 5", &mut live).unwrap();

    let outcome = mgr.try_reap_one(&mut live).unwrap();
    assert_eq!(outcome, ReapOutcome::NoChange);
    assert_eq!(live.get(), 1);
    assert!(mgr.is_registered(pid));

    mgr.kill_all().unwrap();
    let reaped = mgr.wait_reap_one(&mut live).unwrap();
    assert_eq!(reaped.pid, pid);
    assert_eq!(reaped.signal(), Some(Signal::SIGTERM));
    assert_eq!(live.get(), 0);
}

#[test]
#[serial]
fn test_try_reap_with_no_children_fails() {
    let mut mgr = manager();
    let mut live = LiveCount::new();

    let err = mgr.try_reap_one(&mut live).unwrap_err();
    assert!(err.is_no_children());
}

#[test]
#[serial]
fn test_kill_all_twice_never_fails() {
    let mut mgr = manager();
    let mut live = LiveCount::new();
    mgr.spawn("sleep 5", &mut live).unwrap();
    mgr.spawn("sleep 5", &mut live).unwrap();

    let first = mgr.kill_all().unwrap();
    assert_eq!(first.total(), 2);

    // Signaled children stay registered until reaped
    let second = mgr.kill_all().unwrap();
    assert_eq!(second.total(), 2);
    assert_eq!(mgr.len(), 2);

    let reaped = mgr.drain(&mut live).unwrap();
    assert_eq!(reaped.len(), 2);
    assert_eq!(live.get(), 0);

    let empty = mgr.kill_all().unwrap();
    assert_eq!(empty.total(), 0);
}

#[test]
#[serial]
fn test_exit_code_is_reported() {
    let mut mgr = manager();
    let mut live = LiveCount::new();
    mgr.spawn("  false   ignored-arg ", &mut live).unwrap();

    let reaped = mgr.wait_reap_one(&mut live).unwrap();
    assert_eq!(reaped.exit_code(), Some(1));
    assert!(!reaped.success());
}

#[test]
#[serial]
fn test_exec_failure_is_reported_to_parent() {
    let mut mgr = manager();
    let mut live = LiveCount::new();

    let err = mgr
        .spawn("/nonexistent/procpool-missing-binary --flag", &mut live)
        .unwrap_err();
    match err {
        PoolError::ExecFailed { command, errno } => {
            assert_eq!(command, "/nonexistent/procpool-missing-binary --flag");
            assert_eq!(errno, Errno::ENOENT);
        }
        other => panic!("expected ExecFailed, got {other:?}"),
    }

    assert_eq!(live.get(), 0);
    assert!(mgr.is_empty());
    // The failed child was already collected
    assert!(mgr.try_reap_one(&mut live).unwrap_err().is_no_children());
    assert_eq!(EXEC_FAILURE_STATUS, 127);
}

#[test]
#[serial]
fn test_empty_command_rejected() {
    let mut mgr = manager();
    let mut live = LiveCount::new();

    let err = mgr.spawn(" \t ", &mut live).unwrap_err();
    assert!(matches!(err, PoolError::InvalidCommand(_)));
    assert_eq!(live.get(), 0);
}

#[test]
#[serial]
fn test_wait_reap_timeout_expires() {
    let mut mgr = manager();
    let mut live = LiveCount::new();
    mgr.spawn("sleep 5", &mut live).unwrap();

    let outcome = mgr
        .wait_reap_timeout(&mut live, Duration::from_millis(50))
        .unwrap();
    assert!(outcome.is_no_change());
    assert_eq!(live.get(), 1);

    mgr.kill_all().unwrap();
    let outcome = mgr
        .wait_reap_timeout(&mut live, Duration::from_secs(5))
        .unwrap();
    assert!(outcome.reaped().is_some());
    assert_eq!(live.get(), 0);
}

#[test]
#[serial]
fn test_signal_missing_process_is_already_gone() {
    let mgr = manager();
    let outcome = mgr.signal(Pid::from_raw(i32::MAX), Signal::SIGTERM).unwrap();
    assert_eq!(outcome, SignalOutcome::AlreadyGone);
}

#[test]
#[serial]
fn test_registered_in_spawn_order() {
    let mut mgr = manager();
    let mut live = LiveCount::new();
    let a = mgr.spawn("sleep 5", &mut live).unwrap();
    let b = mgr.spawn("sleep 5", &mut live).unwrap();

    assert_eq!(mgr.registered(), vec![a, b]);

    mgr.kill_all().unwrap();
    mgr.drain(&mut live).unwrap();
    assert!(mgr.registered().is_empty());
}
