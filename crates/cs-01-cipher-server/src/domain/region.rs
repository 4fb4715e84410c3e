//! Shared plaintext/ciphertext buffers.
//!
//! Clients load plaintext and read ciphertext; the server reads and writes
//! one block at a time at the cursors named by the active snapshot.

use parking_lot::RwLock;
use shared_crypto::CryptoError;
use shared_types::{is_block_aligned, Block, BLOCK_SIZE};
use tokio::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Buffers {
    plaintext: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// Memory shared between a server and its clients.
#[derive(Default)]
pub struct SharedRegion {
    buffers: RwLock<Buffers>,
    submit: Mutex<()>,
}

impl SharedRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the plaintext and clear the ciphertext to the same length.
    pub fn load_plaintext(&self, data: &[u8]) -> Result<(), CryptoError> {
        if !is_block_aligned(data.len()) {
            return Err(CryptoError::Misaligned {
                len: data.len(),
                block_size: BLOCK_SIZE,
            });
        }
        let mut buffers = self.buffers.write();
        buffers.plaintext = data.to_vec();
        buffers.ciphertext = vec![0u8; data.len()];
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffers.read().plaintext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn plaintext(&self) -> Vec<u8> {
        self.buffers.read().plaintext.clone()
    }

    pub fn ciphertext(&self) -> Vec<u8> {
        self.buffers.read().ciphertext.clone()
    }

    /// Serialise clients that load, call and read back through this region.
    pub async fn lock_submit(&self) -> MutexGuard<'_, ()> {
        self.submit.lock().await
    }

    pub(crate) fn read_block(&self, offset: usize) -> Option<Block> {
        let buffers = self.buffers.read();
        let bytes = buffers.plaintext.get(offset..offset.checked_add(BLOCK_SIZE)?)?;
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(bytes);
        Some(block)
    }

    pub(crate) fn write_block(&self, offset: usize, block: &Block) -> bool {
        let mut buffers = self.buffers.write();
        let Some(end) = offset.checked_add(BLOCK_SIZE) else {
            return false;
        };
        match buffers.ciphertext.get_mut(offset..end) {
            Some(target) => {
                target.copy_from_slice(block);
                true
            }
            None => false,
        }
    }
}
