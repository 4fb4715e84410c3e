//! Server phase as seen by observers.

use serde::{Deserialize, Serialize};

/// Request protocol state.
///
/// ```text
/// [IDLE] ──recv──→ [ACTIVE] ──complete / reject / restore──→ [IDLE]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServerPhase {
    /// Waiting in `recv`.
    #[default]
    Idle,
    /// Processing blocks.
    Active,
}

/// Published on every phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerStatus {
    pub phase: ServerPhase,
    /// Incremented every time the server reaches its idle receive point.
    pub idle_epoch: u64,
    /// Requests answered with `remaining = 0`.
    pub completed: u64,
    /// Requests rejected as protocol violations.
    pub rejected: u64,
    /// Requests abandoned by a checkpoint restore.
    pub restored: u64,
}

impl ServerStatus {
    pub fn is_busy(&self) -> bool {
        self.phase == ServerPhase::Active
    }
}
