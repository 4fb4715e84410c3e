//! Crypto error types.

use thiserror::Error;

/// Cipher engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Buffer length is not a whole number of blocks
    #[error("Misaligned input: {len} bytes is not a multiple of {block_size}")]
    Misaligned {
        /// Actual length in bytes
        len: usize,
        /// Block size in bytes
        block_size: usize,
    },

    /// PKCS#7 padding is malformed
    #[error("Invalid padding")]
    InvalidPadding,

    /// Invalid key length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },
}
