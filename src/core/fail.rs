/*!
 * Fail-Fast Policy
 * Default policy for callers that treat any pool error as fatal
 */

use super::errors::PoolError;
use tracing::error;

/// Exit status used on the fail-fast path
pub const FAIL_FAST_STATUS: i32 = 1;

/// Report a pool error and terminate the current process
pub fn fail_fast(context: &str, err: PoolError) -> ! {
    error!(context, kind = ?err.kind(), error = %err, "fatal pool error");
    eprintln!("{context}: {:?}", miette::Report::new(err));
    std::process::exit(FAIL_FAST_STATUS)
}

/// Turns a [`PoolError`] result into a value or a process exit
///
/// Mirrors the classic "print the error and quit" discipline of worker
/// processes whose supervisor accounts for their disappearance.
pub trait FailFast<T> {
    fn or_exit(self, context: &str) -> T;
}

impl<T> FailFast<T> for Result<T, PoolError> {
    fn or_exit(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => fail_fast(context, err),
        }
    }
}
