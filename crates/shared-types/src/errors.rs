//! # Error Types
//!
//! Failures of the environment primitives (scheduling, checkpoint, IPC).
//! Every variant is fatal to the run: there is no well-defined way to recover
//! from a failure of the recovery mechanism itself.

use crate::entities::{CheckpointId, ReplyCapId, SchedContextId, ThreadId};
use thiserror::Error;

/// Errors reported by the kernel primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("Unknown thread: {0}")]
    UnknownThread(ThreadId),

    #[error("Unknown scheduling context: {0}")]
    UnknownSchedContext(SchedContextId),

    #[error("Scheduling context {context} is already bound to {thread}")]
    ContextInUse {
        context: SchedContextId,
        thread: ThreadId,
    },

    #[error("Thread {thread} already has scheduling context {context}")]
    ThreadAlreadyBound {
        thread: ThreadId,
        context: SchedContextId,
    },

    #[error("Scheduling context {0} is not bound")]
    ContextNotBound(SchedContextId),

    #[error("Invalid budget grant: budget {budget}, period {period}")]
    InvalidGrant { budget: u64, period: u64 },

    #[error("Thread {0} has no budget to run")]
    NoBudget(ThreadId),

    #[error("Thread {0} is not suspended")]
    NotSuspended(ThreadId),

    #[error("Unknown checkpoint: {0}")]
    UnknownCheckpoint(CheckpointId),

    #[error("Unknown reply capability: {0}")]
    UnknownReplyCap(ReplyCapId),

    #[error("Thread {0} is not serving a call")]
    NoCaller(ThreadId),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

/// Result type for kernel primitives.
pub type KernelResult<T> = Result<T, KernelError>;
