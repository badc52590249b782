/*!
 * IPC Core Module
 * Typed keys and the generic create/lookup/destroy plumbing
 */

pub mod keys;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use keys::destroy;
pub use traits::IpcKind;
pub use types::*;
