//! Double-Buffered Cursor
//!
//! Two snapshot slots and an active indicator. The server writes the next
//! snapshot into the slot that is *not* active, fences, then flips the
//! indicator. A reader that runs at any instant, including between the two
//! steps of a publish, sees either the old or the new snapshot.
//!
//! ```text
//!            stage(next)                 commit()
//! active ──→ [A: s(n)]   [B: ....]  ──→  [A: s(n)]   [B: s(n+1)] ←── active
//!            [B ← s(n+1) written]        fence(Release); active = B
//! ```
//!
//! Each slot is additionally guarded by a sequence counter, so a reader that
//! is overtaken by two publishes (and finds its slot being rewritten) retries
//! instead of returning a mix of two blocks.
//!
//! The writer half is deliberately not `Clone`: the server is the only
//! party that may publish.

use super::snapshot::Snapshot;
use shared_types::Block;
use std::sync::atomic::{fence, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

const NO_SLOT: usize = usize::MAX;

struct Slot {
    /// Odd while the slot is being written.
    seq: AtomicU64,
    vector: [AtomicU64; 2],
    plaintext_cursor: AtomicUsize,
    ciphertext_cursor: AtomicUsize,
    remaining: AtomicUsize,
}

impl Slot {
    fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
            vector: [AtomicU64::new(0), AtomicU64::new(0)],
            plaintext_cursor: AtomicUsize::new(0),
            ciphertext_cursor: AtomicUsize::new(0),
            remaining: AtomicUsize::new(0),
        }
    }

    /// Single writer only.
    fn store(&self, snapshot: &Snapshot) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        let (hi, lo) = split_vector(&snapshot.vector);
        self.vector[0].store(hi, Ordering::Relaxed);
        self.vector[1].store(lo, Ordering::Relaxed);
        self.plaintext_cursor
            .store(snapshot.plaintext_cursor, Ordering::Relaxed);
        self.ciphertext_cursor
            .store(snapshot.ciphertext_cursor, Ordering::Relaxed);
        self.remaining.store(snapshot.remaining, Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// `None` if the slot changed while it was being read.
    fn load(&self) -> Option<Snapshot> {
        let before = self.seq.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }

        let vector = join_vector(
            self.vector[0].load(Ordering::Relaxed),
            self.vector[1].load(Ordering::Relaxed),
        );
        let snapshot = Snapshot {
            vector,
            plaintext_cursor: self.plaintext_cursor.load(Ordering::Relaxed),
            ciphertext_cursor: self.ciphertext_cursor.load(Ordering::Relaxed),
            remaining: self.remaining.load(Ordering::Relaxed),
        };

        fence(Ordering::Acquire);
        let after = self.seq.load(Ordering::Relaxed);
        (before == after).then_some(snapshot)
    }
}

fn split_vector(vector: &Block) -> (u64, u64) {
    let mut hi = [0u8; 8];
    let mut lo = [0u8; 8];
    hi.copy_from_slice(&vector[..8]);
    lo.copy_from_slice(&vector[8..]);
    (u64::from_le_bytes(hi), u64::from_le_bytes(lo))
}

fn join_vector(hi: u64, lo: u64) -> Block {
    let mut vector = [0u8; 16];
    vector[..8].copy_from_slice(&hi.to_le_bytes());
    vector[8..].copy_from_slice(&lo.to_le_bytes());
    vector
}

struct Shared {
    slots: [Slot; 2],
    active: AtomicUsize,
    published: AtomicU64,
}

/// Create a cursor with no active snapshot.
pub fn double_buffered_cursor() -> (CursorWriter, CursorReader) {
    let shared = Arc::new(Shared {
        slots: [Slot::new(), Slot::new()],
        active: AtomicUsize::new(NO_SLOT),
        published: AtomicU64::new(0),
    });
    (
        CursorWriter {
            shared: shared.clone(),
            staged: None,
        },
        CursorReader { shared },
    )
}

/// Publishing half, owned by the server.
pub struct CursorWriter {
    shared: Arc<Shared>,
    staged: Option<usize>,
}

impl CursorWriter {
    /// Make `next` the active snapshot.
    pub fn publish(&mut self, next: Snapshot) {
        self.stage(next);
        self.commit();
    }

    /// First half of [`publish`](Self::publish): write `next` into the
    /// inactive slot without making it visible.
    pub fn stage(&mut self, next: Snapshot) {
        let target = match self.shared.active.load(Ordering::Relaxed) {
            0 => 1,
            _ => 0,
        };
        self.shared.slots[target].store(&next);
        self.staged = Some(target);
    }

    /// Second half of [`publish`](Self::publish): flip the active indicator
    /// to the staged slot. Returns `false` if nothing was staged.
    pub fn commit(&mut self) -> bool {
        let Some(target) = self.staged.take() else {
            return false;
        };
        fence(Ordering::Release);
        self.shared.active.store(target, Ordering::Release);
        self.shared.published.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Drop the active snapshot; the request is over.
    pub fn retire(&mut self) {
        self.staged = None;
        self.shared.active.store(NO_SLOT, Ordering::Release);
    }

    /// Active snapshot. The writer never races itself, so this never retries.
    pub fn current(&self) -> Option<Snapshot> {
        let active = self.shared.active.load(Ordering::Relaxed);
        self.shared.slots.get(active).and_then(Slot::load)
    }

    pub fn reader(&self) -> CursorReader {
        CursorReader {
            shared: self.shared.clone(),
        }
    }
}

/// Observing half, for the recovery controller and clients.
#[derive(Clone)]
pub struct CursorReader {
    shared: Arc<Shared>,
}

impl CursorReader {
    /// Copy of the active snapshot, `None` when no request is in flight.
    pub fn read_active(&self) -> Option<Snapshot> {
        loop {
            let active = self.shared.active.load(Ordering::Acquire);
            let slot = self.shared.slots.get(active)?;
            if let Some(snapshot) = slot.load() {
                // The slot may have been restaged after a flip away from it.
                if self.shared.active.load(Ordering::Acquire) == active {
                    return Some(snapshot);
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Number of commits so far.
    pub fn published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CursorReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorReader")
            .field("active", &self.read_active())
            .field("published", &self.published())
            .finish()
    }
}
