//! # IPC Messages
//!
//! The call/reply exchange between a client and the cipher server, and the
//! asynchronous events the kernel delivers to the recovery controller.
//!
//! ```text
//! Client ──Request──→ Server            (call; client blocks)
//! Client ←──Reply──── Server/Controller (reply or reply via revoked cap)
//! Kernel ──FaultEvent──→ Controller     (budget exhausted mid-request)
//! ```

use crate::entities::{is_block_aligned, Block, CheckpointId, SchedContextId, ThreadId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Client → server request.
///
/// `vector == None` is the new-request sentinel: the server substitutes its
/// configured IV, cursors `0/0` and its whole region as the length. Any other
/// value is a resume request and becomes the initial snapshot verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub vector: Option<Block>,
    pub plaintext_cursor: usize,
    pub ciphertext_cursor: usize,
    pub remaining: usize,
}

impl Request {
    /// New request over the server's default buffers.
    pub fn fresh() -> Self {
        Self {
            vector: None,
            plaintext_cursor: 0,
            ciphertext_cursor: 0,
            remaining: 0,
        }
    }

    /// Continue a partially completed job.
    pub fn resume(
        vector: Block,
        plaintext_cursor: usize,
        ciphertext_cursor: usize,
        remaining: usize,
    ) -> Self {
        Self {
            vector: Some(vector),
            plaintext_cursor,
            ciphertext_cursor,
            remaining,
        }
    }

    /// True for the new-request sentinel.
    pub fn is_fresh(&self) -> bool {
        self.vector.is_none()
    }
}

/// Server → client reply. `remaining == 0` is success; anything else
/// (conventionally the original length) means nothing was delivered and the
/// whole request must be resubmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub remaining: usize,
}

impl Reply {
    pub fn success() -> Self {
        Self { remaining: 0 }
    }

    pub fn failure(original_length: usize) -> Self {
        Self {
            remaining: original_length,
        }
    }

    pub fn is_success(&self) -> bool {
        self.remaining == 0
    }

    /// Check the reply against the length that was requested.
    pub fn validate(&self, requested: usize) -> Result<(), ProtocolViolation> {
        if self.remaining > requested || !is_block_aligned(self.remaining) {
            return Err(ProtocolViolation::UnexpectedReply {
                remaining: self.remaining,
                requested,
            });
        }
        Ok(())
    }
}

/// What actually travels back over a reply cap.
pub type ReplyMessage = Result<Reply, ProtocolViolation>;

/// Caller misuse. The request is rejected without advancing any snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProtocolViolation {
    /// Resume length is not a whole number of blocks.
    #[error("Misaligned request: {remaining} bytes is not a multiple of the block size")]
    Misaligned { remaining: usize },

    /// Cursor plus length runs past the shared region.
    #[error("Request out of bounds: cursor {cursor} + {remaining} bytes exceeds region of {region} bytes")]
    OutOfBounds {
        cursor: usize,
        remaining: usize,
        region: usize,
    },

    /// Reply length that no request of this size could produce.
    #[error("Unexpected reply: {remaining} bytes remaining for a {requested} byte request")]
    UnexpectedReply { remaining: usize, requested: usize },
}

/// Budget exhaustion reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultEvent {
    /// Thread whose budget ran out.
    pub thread: ThreadId,
    /// Context that was charged when the budget ran out.
    pub sched_context: SchedContextId,
    /// Client whose call the thread was serving, if any.
    pub caller: Option<ThreadId>,
}

/// How a parked thread is woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resumption {
    /// Carry on from where it stopped.
    Continue,
    /// Abandon the current work and return to the checkpointed state.
    Restore(CheckpointId),
}
