/*!
 * Job Runner Tests
 * Bounded execution of real job lists
 */

use pretty_assertions::assert_eq;
use procpool::core::ReapConfig;
use procpool::process::{ChildManager, JobRunner};
use procpool::signals::ShutdownFlag;
use serial_test::serial;
use std::time::{Duration, Instant};

fn runner(max_children: usize) -> JobRunner<ChildManager> {
    let config = ReapConfig {
        poll_interval: Duration::from_millis(5),
        ..ReapConfig::default()
    };
    JobRunner::new(ChildManager::new(config), max_children)
}

fn jobs(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
#[serial]
fn test_mixed_job_list() {
    let mut runner = runner(2);
    let shutdown = ShutdownFlag::new();
    let summary = runner
        .run(
            &jobs(&["true", "false", "/nonexistent/procpool-job", "sleep 0"]),
            shutdown.as_atomic(),
        )
        .unwrap();

    assert_eq!(summary.launched, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 2);
    assert!(!summary.all_succeeded());
    assert_eq!(summary.jobs[1].exit_code, Some(1));
    assert!(summary.jobs[2].error.is_some());
    assert!(runner.lifecycle().is_empty());
}

#[test]
#[serial]
fn test_concurrency_limit_serializes_sleeps() {
    let mut runner = runner(1);
    let shutdown = ShutdownFlag::new();
    let started = Instant::now();
    let summary = runner
        .run(&jobs(&["sleep 0.2", "sleep 0.2"]), shutdown.as_atomic())
        .unwrap();

    assert!(summary.all_succeeded());
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[test]
#[serial]
fn test_shutdown_terminates_running_jobs() {
    let mut runner = runner(2);
    let shutdown = ShutdownFlag::new();
    let trigger = shutdown.clone();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        trigger.request();
    });

    let summary = runner
        .run(&jobs(&["sleep 30", "sleep 30", "true"]), shutdown.as_atomic())
        .unwrap();
    stopper.join().unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.launched, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.jobs[0].signal.as_deref(), Some("SIGTERM"));
    assert_eq!(summary.jobs[1].signal.as_deref(), Some("SIGTERM"));
    assert!(runner.lifecycle().is_empty());
}
