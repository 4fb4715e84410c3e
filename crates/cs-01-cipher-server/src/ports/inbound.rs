//! Driving Ports (API - Inbound)
//!
//! What the recovery controller and clients may ask of a running server.
//! Nothing here mutates the cursor.

use crate::domain::{CursorReader, ServerStatus, Snapshot};
use crate::error::CipherResult;
use async_trait::async_trait;
use shared_types::{CheckpointId, ThreadId};

/// Observer view of one cipher server instance.
#[async_trait]
pub trait CipherServerApi: Send + Sync {
    /// Thread the server runs on.
    fn thread(&self) -> ThreadId;

    /// Active progress snapshot, `None` when idle.
    fn read_active(&self) -> Option<Snapshot>;

    /// A reader half of the server's cursor.
    fn cursor(&self) -> CursorReader;

    /// Current phase and counters.
    fn status(&self) -> ServerStatus;

    /// Checkpoint saved at the first idle point, once the server has started.
    fn checkpoint(&self) -> Option<CheckpointId>;

    /// Initial snapshot of the request being served.
    fn in_flight(&self) -> Option<Snapshot>;

    /// Total blocks encrypted by this instance.
    fn blocks_encrypted(&self) -> u64;

    /// Wait until the server has been idle at least once after `epoch`.
    async fn wait_idle_after(&self, epoch: u64) -> CipherResult<ServerStatus>;
}
