//! Runtime errors.

use crate::config::ConfigError;
use cs_01_cipher_server::CipherError;
use cs_02_budget_recovery::RecoveryError;
use shared_crypto::CryptoError;
use shared_types::{KernelError, ThreadId};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Cipher server error: {0}")]
    Server(#[from] CipherError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("{thread} did not respond within {after:?}")]
    Timeout { thread: ThreadId, after: Duration },

    #[error("Recovery controller task ended unexpectedly")]
    ControllerStopped,
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
