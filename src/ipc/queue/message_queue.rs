/*!
 * Message Queue
 * Handle type wrapping msgget/msgsnd/msgrcv
 */

use super::types::{QueueMessage, RawMessage, HANDSHAKE_TYPE, MAX_MESSAGE_SIZE};
use crate::core::config::IpcConfig;
use crate::core::errors::{ObjectKind, PoolError, PoolResult};
use crate::ipc::core::keys;
use crate::ipc::core::{Msg, MsgKey, RawId};
use nix::errno::Errno;
use std::mem;
use tracing::{debug, info};

/// Handle to a System V message queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageQueue {
    key: MsgKey,
    id: RawId,
}

impl MessageQueue {
    pub fn create(config: &IpcConfig) -> PoolResult<Self> {
        let (key, id) = keys::allocate::<Msg, _>(config, |raw, flags| {
            Errno::result(unsafe { libc::msgget(raw, flags) })
        })?;
        info!(%key, id, "Created message queue");
        Ok(Self { key, id })
    }

    pub fn lookup(key: MsgKey) -> PoolResult<Self> {
        let id = keys::lookup(key)?;
        Ok(Self { key, id })
    }

    pub fn destroy(key: MsgKey) -> PoolResult<bool> {
        keys::destroy(key)
    }

    pub fn remove(&self) -> PoolResult<bool> {
        keys::remove_id(self.id, self.key)
    }

    pub fn key(&self) -> MsgKey {
        self.key
    }

    /// Post a handshake token, blocking while the queue is full
    pub fn send(&self) -> PoolResult<()> {
        self.send_bytes(HANDSHAKE_TYPE, &[])
    }

    /// Wait for a handshake token
    pub fn receive(&self) -> PoolResult<()> {
        self.receive_bytes(HANDSHAKE_TYPE).map(drop)
    }

    /// Take a handshake token if one is queued
    pub fn try_receive(&self) -> PoolResult<bool> {
        match self.recv_raw(HANDSHAKE_TYPE, libc::IPC_NOWAIT) {
            Ok(_) => Ok(true),
            Err(PoolError::WouldBlock { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Send `body` tagged with `mtype` (must be positive)
    pub fn send_bytes(&self, mtype: i64, body: &[u8]) -> PoolResult<()> {
        if mtype <= 0 {
            return Err(self.failed("send", Errno::EINVAL));
        }
        if body.len() > MAX_MESSAGE_SIZE {
            return Err(PoolError::OutOfRange {
                offset: 0,
                len: body.len(),
                size: MAX_MESSAGE_SIZE,
            });
        }

        let mut raw = RawMessage::empty();
        raw.mtype = mtype as libc::c_long;
        raw.mtext[..body.len()].copy_from_slice(body);

        Errno::result(unsafe {
            libc::msgsnd(
                self.id,
                (&raw as *const RawMessage).cast::<libc::c_void>(),
                body.len(),
                0,
            )
        })
        .map_err(|errno| self.failed("send", errno))?;

        debug!(key = %self.key, mtype, len = body.len(), "Message sent");
        Ok(())
    }

    /// Block until a message of `mtype` arrives (0 takes the first of any type)
    pub fn receive_bytes(&self, mtype: i64) -> PoolResult<QueueMessage> {
        self.recv_raw(mtype, 0)
    }

    /// Number of messages currently queued
    pub fn pending(&self) -> PoolResult<u64> {
        let mut ds: libc::msqid_ds = unsafe { mem::zeroed() };
        Errno::result(unsafe { libc::msgctl(self.id, libc::IPC_STAT, &mut ds) })
            .map_err(|errno| self.failed("stat", errno))?;
        Ok(ds.msg_qnum as u64)
    }

    fn recv_raw(&self, mtype: i64, flags: libc::c_int) -> PoolResult<QueueMessage> {
        let mut raw = RawMessage::empty();
        let received = unsafe {
            libc::msgrcv(
                self.id,
                (&mut raw as *mut RawMessage).cast::<libc::c_void>(),
                MAX_MESSAGE_SIZE,
                mtype as libc::c_long,
                flags,
            )
        };

        let len = match Errno::result(received) {
            Ok(len) => len as usize,
            Err(Errno::ENOMSG) => {
                return Err(PoolError::WouldBlock {
                    kind: ObjectKind::MessageQueue,
                    op: "receive",
                })
            }
            Err(errno) => return Err(self.failed("receive", errno)),
        };

        debug!(key = %self.key, mtype = raw.mtype as i64, len, "Message received");
        Ok(QueueMessage {
            mtype: raw.mtype as i64,
            body: raw.mtext[..len].to_vec(),
        })
    }

    fn failed(&self, op: &'static str, errno: Errno) -> PoolError {
        PoolError::KernelOperationFailed {
            kind: ObjectKind::MessageQueue,
            op,
            errno,
        }
    }
}
