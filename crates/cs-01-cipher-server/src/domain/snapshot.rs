//! Progress Snapshot
//!
//! How much of one request is done. A snapshot is never updated in place:
//! every block produces a new value via [`Snapshot::advance`].

use serde::{Deserialize, Serialize};
use shared_types::{Block, Request, BLOCK_SIZE};

/// Progress of one request.
///
/// INVARIANT: `remaining % BLOCK_SIZE == 0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// IV at request start, otherwise the last ciphertext block.
    pub vector: Block,
    /// Next plaintext byte to read from the shared region.
    pub plaintext_cursor: usize,
    /// Next ciphertext byte to write to the shared region.
    pub ciphertext_cursor: usize,
    /// Bytes still to process.
    pub remaining: usize,
}

impl Snapshot {
    /// Snapshot at the start of a request.
    pub fn begin(
        iv: Block,
        plaintext_cursor: usize,
        ciphertext_cursor: usize,
        remaining: usize,
    ) -> Self {
        Self {
            vector: iv,
            plaintext_cursor,
            ciphertext_cursor,
            remaining,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    pub fn blocks_remaining(&self) -> usize {
        self.remaining / BLOCK_SIZE
    }

    /// Progress after one more block, whose ciphertext becomes the next
    /// chain vector.
    ///
    /// Must not be called on a complete snapshot.
    pub fn advance(&self, ciphertext: Block) -> Self {
        debug_assert!(!self.is_complete(), "advance past the end of a request");
        Self {
            vector: ciphertext,
            plaintext_cursor: self.plaintext_cursor + BLOCK_SIZE,
            ciphertext_cursor: self.ciphertext_cursor + BLOCK_SIZE,
            remaining: self.remaining - BLOCK_SIZE,
        }
    }

    /// Resume request that continues from this snapshot.
    pub fn to_request(&self) -> Request {
        Request::resume(
            self.vector,
            self.plaintext_cursor,
            self.ciphertext_cursor,
            self.remaining,
        )
    }
}
