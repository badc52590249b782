/*!
 * Signals Module
 * SIGINT/SIGTERM turned into a polled shutdown request
 */

use crate::core::errors::{PoolError, PoolResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Set once when the runner is asked to stop
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Borrow the flag in the form the job runner polls
    pub fn as_atomic(&self) -> &AtomicBool {
        &self.0
    }
}

/// Route SIGINT, SIGTERM and SIGHUP to `flag`
///
/// Can be installed once per process.
pub fn install_shutdown_handler(flag: &ShutdownFlag) -> PoolResult<()> {
    let flag = flag.clone();
    ctrlc::set_handler(move || {
        if flag.is_requested() {
            warn!("Shutdown already in progress");
        } else {
            info!("Termination requested, stopping children");
        }
        flag.request();
    })
    .map_err(|e| PoolError::SignalSetup(e.to_string()))
}
