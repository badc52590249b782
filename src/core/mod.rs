/*!
 * Core Module
 * Error types, fail-fast policy and configuration shared by every subsystem
 */

pub mod config;
pub mod errors;
pub mod fail;

// Re-export for convenience
pub use config::{IpcConfig, OverflowPolicy, PoolConfig, ReapConfig};
pub use errors::*;
pub use fail::{fail_fast, FailFast, FAIL_FAST_STATUS};
