/*!
 * Message Queue Module
 * System V message queues for work handoff and completion signals
 */

pub mod message_queue;
pub mod types;

// Re-export public API
pub use message_queue::MessageQueue;
pub use types::{QueueMessage, HANDSHAKE_TYPE, MAX_MESSAGE_SIZE};
