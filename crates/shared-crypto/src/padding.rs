//! # PKCS#7 Padding
//!
//! Applied once per request, never on the per-block path.

use crate::CryptoError;
use shared_types::BLOCK_SIZE;

/// Pad to a whole number of blocks. Always appends between 1 and
/// `BLOCK_SIZE` bytes, each equal to the pad length.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.resize(data.len() + pad_len, pad_len as u8);
    out
}

/// Strip PKCS#7 padding.
///
/// # Errors
///
/// Returns `CryptoError::Misaligned` for a partial block and
/// `CryptoError::InvalidPadding` if the trailer is malformed.
pub fn depad(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::Misaligned {
            len: data.len(),
            block_size: BLOCK_SIZE,
        });
    }

    let pad_len = data[data.len() - 1] as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE {
        return Err(CryptoError::InvalidPadding);
    }

    let (body, trailer) = data.split_at(data.len() - pad_len);
    if trailer.iter().any(|&b| b as usize != pad_len) {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(body.to_vec())
}
