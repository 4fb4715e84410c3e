//! Error types for the cipher server

use shared_crypto::CryptoError;
use shared_types::{KernelError, ProtocolViolation};
use thiserror::Error;

/// Cipher server errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// Scheduling, checkpoint or IPC primitive failed
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    /// The request was rejected by the server, or the reply made no sense
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Padding or buffer alignment problem at a request boundary
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The server answered with a failure report (rolled back)
    #[error("Request failed: {remaining} of {requested} bytes not processed")]
    RequestFailed { remaining: usize, requested: usize },

    /// The server task is gone
    #[error("Cipher server stopped")]
    ServerStopped,
}

impl CipherError {
    /// Environment failures end the run; everything else is per-request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Kernel(_) | Self::ServerStopped)
    }

    /// A failure report the client should answer by resubmitting in full.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RequestFailed { .. })
    }
}

/// Result type for cipher server operations
pub type CipherResult<T> = Result<T, CipherError>;
