//! Error types for the recovery controller
//!
//! Every variant is fatal to the run: a failure of the recovery mechanism
//! itself has no well-defined recovery.

use cs_01_cipher_server::CipherError;
use shared_types::{KernelError, ThreadId};
use thiserror::Error;

/// Recovery controller errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    /// A scheduling, checkpoint or IPC primitive failed
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    /// The server could not be observed
    #[error("Server error: {0}")]
    Server(#[from] CipherError),

    /// Rollback needs the checkpoint the server saves at startup
    #[error("Server {0} has not saved a checkpoint")]
    NoCheckpoint(ThreadId),

    /// Rollback needs a recovery scheduling context
    #[error("No recovery scheduling context configured")]
    MissingRecoveryContext,

    /// The faulting thread was not serving a call
    #[error("Fault on {0} has no caller")]
    NoCaller(ThreadId),

    /// Emergency donation needs the client to hold a context
    #[error("Client {0} has no scheduling context to donate")]
    NoClientContext(ThreadId),

    /// The server faulted again while running on a donated context
    #[error("Server {server} exhausted the budget donated by {client}")]
    DonatedBudgetExhausted { server: ThreadId, client: ThreadId },

    /// Configuration rejected at construction
    #[error("Invalid recovery configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;
