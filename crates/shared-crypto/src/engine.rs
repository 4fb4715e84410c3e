//! # CBC Engine
//!
//! AES-256 single-block step with CBC chaining.
//!
//! ## Security Properties
//!
//! - **Key hygiene**: `CipherKey` is zeroized on drop
//! - **No hot-path allocation**: `CbcEngine::encrypt_block` works on stack blocks

use crate::CryptoError;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use shared_types::{is_block_aligned, Block, BLOCK_SIZE};
use std::fmt;
use zeroize::Zeroize;

/// Key length for AES-256.
pub const KEY_SIZE: usize = 32;

/// Secret key (256-bit).
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct CipherKey([u8; KEY_SIZE]);

impl CipherKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` unless the slice is 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(key))
    }

    /// Generate random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

/// AES-256 with a prepared key schedule.
///
/// Owned by exactly one server; never shared for writing.
#[derive(Clone)]
pub struct CbcEngine {
    cipher: Aes256,
}

impl CbcEngine {
    /// Expand the key schedule once.
    pub fn new(key: &CipherKey) -> Self {
        Self {
            cipher: Aes256::new(aes::cipher::generic_array::GenericArray::from_slice(
                key.as_bytes(),
            )),
        }
    }

    /// One CBC step: returns `(ciphertext_block, next_vector)` where
    /// `next_vector == ciphertext_block`.
    pub fn encrypt_block(&self, vector: &Block, plaintext: &Block) -> (Block, Block) {
        let mut block = aes::Block::default();
        for (out, (p, v)) in block.iter_mut().zip(plaintext.iter().zip(vector.iter())) {
            *out = p ^ v;
        }
        self.cipher.encrypt_block(&mut block);

        let ciphertext = to_block(&block);
        (ciphertext, ciphertext)
    }

    /// Inverse CBC step: returns `(plaintext_block, next_vector)` where
    /// `next_vector` is the ciphertext block that was consumed.
    pub fn decrypt_block(&self, vector: &Block, ciphertext: &Block) -> (Block, Block) {
        let mut block = aes::Block::clone_from_slice(ciphertext);
        self.cipher.decrypt_block(&mut block);

        let mut plaintext = to_block(&block);
        for (p, v) in plaintext.iter_mut().zip(vector.iter()) {
            *p ^= v;
        }
        (plaintext, *ciphertext)
    }

    /// Encrypt a block-aligned buffer.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Misaligned` if `data` is not a whole number of blocks.
    pub fn encrypt(&self, iv: &Block, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.chain(iv, data, |vector, block| self.encrypt_block(vector, block))
    }

    /// Decrypt a block-aligned buffer.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Misaligned` if `data` is not a whole number of blocks.
    pub fn decrypt(&self, iv: &Block, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.chain(iv, data, |vector, block| self.decrypt_block(vector, block))
    }

    fn chain<F>(&self, iv: &Block, data: &[u8], step: F) -> Result<Vec<u8>, CryptoError>
    where
        F: Fn(&Block, &Block) -> (Block, Block),
    {
        if !is_block_aligned(data.len()) {
            return Err(CryptoError::Misaligned {
                len: data.len(),
                block_size: BLOCK_SIZE,
            });
        }

        let mut out = Vec::with_capacity(data.len());
        let mut vector = *iv;
        for chunk in data.chunks_exact(BLOCK_SIZE) {
            let (produced, next) = step(&vector, &to_block(chunk));
            out.extend_from_slice(&produced);
            vector = next;
        }
        Ok(out)
    }
}

impl fmt::Debug for CbcEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbcEngine").finish_non_exhaustive()
    }
}

fn to_block(bytes: &[u8]) -> Block {
    let mut block = [0u8; BLOCK_SIZE];
    block.copy_from_slice(bytes);
    block
}

/// One CBC encryption step with a freshly expanded key.
pub fn encrypt_block(key: &CipherKey, vector: &Block, plaintext: &Block) -> (Block, Block) {
    CbcEngine::new(key).encrypt_block(vector, plaintext)
}

/// One CBC decryption step with a freshly expanded key.
pub fn decrypt_block(key: &CipherKey, vector: &Block, ciphertext: &Block) -> (Block, Block) {
    CbcEngine::new(key).decrypt_block(vector, ciphertext)
}

/// Reference whole-buffer CBC encryption.
///
/// # Errors
///
/// Returns `CryptoError::Misaligned` if `data` is not a whole number of blocks.
pub fn cbc_encrypt(key: &CipherKey, iv: &Block, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    CbcEngine::new(key).encrypt(iv, data)
}

/// Reference whole-buffer CBC decryption.
///
/// # Errors
///
/// Returns `CryptoError::Misaligned` if `data` is not a whole number of blocks.
pub fn cbc_decrypt(key: &CipherKey, iv: &Block, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    CbcEngine::new(key).decrypt(iv, data)
}
