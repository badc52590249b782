/*!
 * Job List Tests
 * Loading job files into shared memory and reading them back
 */

use pretty_assertions::assert_eq;
use procpool::core::{IpcConfig, OverflowPolicy, PoolConfig, PoolError};
use procpool::ipc::{load_job_list, read_job_list, IpcRegistry, JobListOptions};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn registry() -> IpcRegistry {
    IpcRegistry::new(IpcConfig::default().with_base_key(0x5054_5000))
}

fn job_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const FIVE_JOBS: &str = "echo one\necho two\n\nsleep 1\nls -l /tmp\ntrue\n";

fn five_jobs() -> Vec<String> {
    ["echo one", "echo two", "sleep 1", "ls -l /tmp", "true"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
#[serial]
fn test_chain_splits_across_segments() {
    let file = job_file(FIVE_JOBS);
    let mut registry = registry();
    let options = JobListOptions {
        max_lines: 2,
        line_width: 32,
        overflow: OverflowPolicy::Chain,
    };

    let chain = load_job_list(file.path(), options, &mut registry).unwrap();
    assert_eq!(chain.total_lines, 5);
    assert_eq!(chain.dropped_lines, 0);
    assert_eq!(chain.segment_count(), 3);
    assert_eq!(registry.len(), 3);

    assert_eq!(read_job_list(chain.first_key()).unwrap(), five_jobs());

    let report = registry.cleanup();
    assert_eq!(report.destroyed, 3);
    assert!(read_job_list(chain.first_key()).is_err());
}

#[test]
#[serial]
fn test_truncate_keeps_first_lines() {
    let file = job_file(FIVE_JOBS);
    let mut registry = registry();
    let config = PoolConfig::default()
        .with_max_lines(2)
        .with_line_width(16)
        .with_overflow(OverflowPolicy::Truncate);

    let chain = load_job_list(file.path(), JobListOptions::from(&config), &mut registry).unwrap();
    assert_eq!(chain.total_lines, 2);
    assert_eq!(chain.dropped_lines, 3);
    assert_eq!(chain.segment_count(), 1);

    let jobs = read_job_list(chain.first_key()).unwrap();
    assert_eq!(jobs, vec!["echo one".to_string(), "echo two".to_string()]);

    registry.cleanup();
}

#[test]
#[serial]
fn test_missing_file_is_io_error() {
    let mut registry = registry();
    let options = JobListOptions::from(&PoolConfig::default());
    let err = load_job_list("/nonexistent/procpool-jobs.txt", options, &mut registry).unwrap_err();
    assert!(matches!(err, PoolError::Io(_)));
}
