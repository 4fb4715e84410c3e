//! What handling a fault did.

use serde::{Deserialize, Serialize};
use shared_types::{BudgetGrant, ThreadId};

/// Why a fault needed no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnoreReason {
    /// The server was not processing a request.
    ServerIdle,
    /// The fault belongs to some other thread.
    ForeignThread,
    /// Rollback found no reply cap: the server already answered.
    NoReplyCap,
}

/// Result of handling one budget fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryOutcome {
    RolledBack {
        client: Option<ThreadId>,
        /// Reported back as `remaining`.
        original_length: usize,
        /// Blocks computed before the fault and thrown away.
        discarded_blocks: usize,
    },
    Donated {
        client: ThreadId,
        /// Finished by `force_done` rather than by the server going idle.
        forced: bool,
    },
    Extended {
        client: ThreadId,
        grant: BudgetGrant,
        at_ceiling: bool,
    },
    Ignored(IgnoreReason),
}

impl RecoveryOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RolledBack { .. } => "rolled_back",
            Self::Donated { .. } => "donated",
            Self::Extended { .. } => "extended",
            Self::Ignored(_) => "ignored",
        }
    }
}

/// Running totals for one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub faults: u64,
    pub rolled_back: u64,
    pub donated: u64,
    pub extended: u64,
    pub ignored: u64,
}

impl RecoveryStats {
    pub fn record(&mut self, outcome: &RecoveryOutcome) {
        self.faults += 1;
        match outcome {
            RecoveryOutcome::RolledBack { .. } => self.rolled_back += 1,
            RecoveryOutcome::Donated { .. } => self.donated += 1,
            RecoveryOutcome::Extended { .. } => self.extended += 1,
            RecoveryOutcome::Ignored(_) => self.ignored += 1,
        }
    }
}
