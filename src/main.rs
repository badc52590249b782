/*!
 * procpool - Main Entry Point
 *
 * Runs every line of a job file as a child process, at most N at a time:
 * - Job list published in shared memory
 * - Job lock semaphore and completion queue for the children
 * - SIGINT/SIGTERM stop the run and terminate children
 * - Every kernel object removed before exit
 */

use clap::Parser;
use procpool::core::config::OverflowPolicy;
use procpool::core::{fail_fast, FailFast, PoolConfig, PoolError, PoolResult};
use procpool::ipc::{load_job_list, read_job_list, CleanupReport, IpcRegistry, JobChain, JobListOptions};
use procpool::monitoring::{init_tracing, span_phase};
use procpool::process::{ChildManager, JobRunner, LiveCount, RunSummary};
use procpool::signals::{install_shutdown_handler, ShutdownFlag};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

/// Key of the first job list segment
pub const JOBS_KEY_ENV: &str = "PROCPOOL_JOBS_KEY";
/// Key of the one-member job lock semaphore
pub const SEM_KEY_ENV: &str = "PROCPOOL_SEM_KEY";
/// Key of the completion message queue
pub const MSG_KEY_ENV: &str = "PROCPOOL_MSG_KEY";

#[derive(Parser, Debug)]
#[command(name = "procpool", version, about = "Run a job file through a bounded process pool")]
struct Cli {
    /// File with one command per line
    jobs_file: PathBuf,

    /// Maximum number of children alive at once
    #[arg(short = 'n', long = "max-children")]
    max_children: Option<usize>,

    /// Lines per shared memory segment
    #[arg(long)]
    max_lines: Option<usize>,

    /// Bytes per job line slot
    #[arg(long)]
    line_width: Option<usize>,

    /// What to do with job files longer than --max-lines
    #[arg(long, value_parser = parse_overflow)]
    overflow: Option<OverflowPolicy>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, mut config: PoolConfig) -> PoolConfig {
        if let Some(n) = self.max_children {
            config = config.with_max_children(n);
        }
        if let Some(lines) = self.max_lines {
            config = config.with_max_lines(lines);
        }
        if let Some(width) = self.line_width {
            config = config.with_line_width(width);
        }
        if let Some(policy) = self.overflow {
            config = config.with_overflow(policy);
        }
        config
    }
}

fn parse_overflow(raw: &str) -> Result<OverflowPolicy, String> {
    raw.parse()
}

/// Keys exported to children through the environment
#[derive(Debug, Clone, Copy, Serialize)]
struct PublishedKeys {
    jobs_key: i32,
    sem_key: i32,
    msg_key: i32,
}

impl PublishedKeys {
    fn export(&self) {
        std::env::set_var(JOBS_KEY_ENV, self.jobs_key.to_string());
        std::env::set_var(SEM_KEY_ENV, self.sem_key.to_string());
        std::env::set_var(MSG_KEY_ENV, self.msg_key.to_string());
    }
}

/// Everything a finished run produced before cleanup
struct Executed {
    chain: JobChain,
    keys: PublishedKeys,
    summary: RunSummary,
    completions: usize,
}

#[derive(Debug, Serialize)]
struct RunReport {
    chain: JobChain,
    keys: PublishedKeys,
    summary: RunSummary,
    /// Completion tokens children left on the queue
    completions: usize,
    cleanup: CleanupReport,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.apply(PoolConfig::from_env());
    info!(
        jobs = %cli.jobs_file.display(),
        max_children = config.max_children,
        max_lines = config.max_lines,
        overflow = ?config.overflow,
        "procpool starting"
    );

    let shutdown = ShutdownFlag::new();
    install_shutdown_handler(&shutdown).or_exit("installing shutdown handler");

    let mut ipc = IpcRegistry::new(config.ipc);
    let outcome = execute(&cli, &config, &mut ipc, &shutdown);

    let cleanup = {
        let phase = span_phase("cleanup");
        let cleanup = phase.in_scope(|| ipc.cleanup());
        phase.record_result(cleanup.is_clean());
        cleanup
    };
    if !cleanup.is_clean() {
        warn!(failed = cleanup.failed, "Some kernel objects could not be removed");
    }

    let executed = match outcome {
        Ok(executed) => executed,
        Err(err) => fail_fast("procpool", err),
    };

    let report = RunReport {
        chain: executed.chain,
        keys: executed.keys,
        summary: executed.summary,
        completions: executed.completions,
        cleanup,
    };
    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => fail_fast("procpool", PoolError::Io(e.into())),
        }
    } else {
        print_report(&report);
    }

    if report.summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn execute(
    cli: &Cli,
    config: &PoolConfig,
    ipc: &mut IpcRegistry,
    shutdown: &ShutdownFlag,
) -> PoolResult<Executed> {
    let (chain, jobs) = {
        let phase = span_phase("load");
        let loaded = phase.in_scope(|| -> PoolResult<_> {
            let chain = load_job_list(&cli.jobs_file, JobListOptions::from(config), ipc)?;
            let jobs = read_job_list(chain.first_key())?;
            Ok((chain, jobs))
        });
        phase.record_result(loaded.is_ok());
        loaded?
    };

    let job_lock = ipc.create_semaphores(1, 1)?;
    let completions = ipc.create_queue()?;
    let keys = PublishedKeys {
        jobs_key: chain.first_key().raw(),
        sem_key: job_lock.key().raw(),
        msg_key: completions.key().raw(),
    };
    keys.export();
    info!(
        jobs_key = %chain.first_key(),
        sem_key = %job_lock.key(),
        msg_key = %completions.key(),
        "Kernel objects published to children"
    );

    let summary = {
        let phase = span_phase("run");
        let mut runner = JobRunner::new(ChildManager::new(config.reap), config.max_children);
        match phase.in_scope(|| runner.run(&jobs, shutdown.as_atomic())) {
            Ok(summary) => {
                phase.record_result(summary.all_succeeded());
                summary
            }
            Err(err) => {
                phase.record_result(false);
                abandon(runner.into_lifecycle());
                return Err(err);
            }
        }
    };

    let mut received = 0;
    while completions.try_receive()? {
        received += 1;
    }
    Ok(Executed {
        chain,
        keys,
        summary,
        completions: received,
    })
}

/// Terminate and collect whatever a failed run left behind
fn abandon(mut manager: ChildManager) {
    use procpool::process::ChildLifecycle;

    if manager.is_empty() {
        return;
    }
    if let Err(e) = manager.kill_all() {
        warn!(error = %e, "Could not signal remaining children");
    }
    let mut live = LiveCount::from(manager.len());
    if let Err(e) = manager.drain(&mut live) {
        warn!(error = %e, "Could not reap remaining children");
    }
}

fn print_report(report: &RunReport) {
    for (idx, job) in report.summary.jobs.iter().enumerate() {
        let status = match (&job.error, job.exit_code, &job.signal) {
            (Some(err), _, _) => format!("not started: {}", err.message),
            (None, Some(code), _) => format!("exit {code}"),
            (None, None, Some(signal)) => format!("killed by {signal}"),
            (None, None, None) => "not run".to_string(),
        };
        println!("[{idx:>3}] {status:<24} {}", job.command);
    }
    println!(
        "{} launched, {} succeeded, {} failed, {} skipped{}",
        report.summary.launched,
        report.summary.succeeded,
        report.summary.failed,
        report.summary.skipped,
        if report.summary.interrupted { " (interrupted)" } else { "" }
    );
}
