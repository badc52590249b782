/*!
 * Queue Types
 * Message layout and limits for System V message queues
 */

use serde::{Deserialize, Serialize};

/// Largest body a single message may carry
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Message type used by the token handshake (`send`/`receive`)
pub const HANDSHAKE_TYPE: i64 = 1;

/// A received message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub mtype: i64,
    pub body: Vec<u8>,
}

/// Kernel wire layout: `long mtype` followed by the body
#[repr(C)]
pub(super) struct RawMessage {
    pub mtype: libc::c_long,
    pub mtext: [u8; MAX_MESSAGE_SIZE],
}

impl RawMessage {
    pub fn empty() -> Self {
        Self {
            mtype: 0,
            mtext: [0; MAX_MESSAGE_SIZE],
        }
    }
}
