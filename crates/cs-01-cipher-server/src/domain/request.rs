//! Request Protocol
//!
//! Turns an incoming [`Request`] into the first snapshot of a job.
//!
//! - `vector == None`: new request over the whole shared region, chained
//!   from the server's configured IV.
//! - `vector == Some(v)`: resumed request; the tuple becomes the snapshot
//!   verbatim after validation.

use super::snapshot::Snapshot;
use shared_types::{is_block_aligned, Block, ProtocolViolation, Request};

/// What a new request expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDefaults {
    pub iv: Block,
    /// Current length of the shared region.
    pub region_len: usize,
}

/// Validate `request` and build its initial snapshot.
pub fn initial_snapshot(
    request: &Request,
    defaults: &RequestDefaults,
) -> Result<Snapshot, ProtocolViolation> {
    let Some(vector) = request.vector else {
        if !is_block_aligned(defaults.region_len) {
            return Err(ProtocolViolation::Misaligned {
                remaining: defaults.region_len,
            });
        }
        return Ok(Snapshot::begin(defaults.iv, 0, 0, defaults.region_len));
    };

    if !is_block_aligned(request.remaining) {
        return Err(ProtocolViolation::Misaligned {
            remaining: request.remaining,
        });
    }
    for cursor in [request.plaintext_cursor, request.ciphertext_cursor] {
        check_bounds(cursor, request.remaining, defaults.region_len)?;
    }

    Ok(Snapshot::begin(
        vector,
        request.plaintext_cursor,
        request.ciphertext_cursor,
        request.remaining,
    ))
}

fn check_bounds(cursor: usize, remaining: usize, region: usize) -> Result<(), ProtocolViolation> {
    match cursor.checked_add(remaining) {
        Some(end) if end <= region => Ok(()),
        _ => Err(ProtocolViolation::OutOfBounds {
            cursor,
            remaining,
            region,
        }),
    }
}
