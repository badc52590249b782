/*!
 * Shared Memory Module
 * System V shared memory segments
 */

pub mod segment;
pub mod types;

// Re-export public API
pub use segment::{ShmMapping, ShmSegment};
pub use types::ShmStats;
