//! # Core Entities
//!
//! Blocks, kernel object identifiers and scheduling grants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// One cipher block. Also the CBC chain vector.
pub type Block = [u8; BLOCK_SIZE];

/// Returns `true` if `len` is a whole number of blocks.
pub fn is_block_aligned(len: usize) -> bool {
    len % BLOCK_SIZE == 0
}

macro_rules! kernel_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

kernel_id!(
    /// A schedulable thread (server, client or controller).
    ThreadId,
    "thread"
);
kernel_id!(
    /// A budget-bearing scheduling context.
    SchedContextId,
    "sc"
);
kernel_id!(
    /// A saved execution context.
    CheckpointId,
    "checkpoint"
);
kernel_id!(
    /// The one-shot right to answer a specific call.
    ReplyCapId,
    "reply"
);

/// Budget and period of a scheduling context, measured in block units.
///
/// INVARIANT: `0 < budget <= period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetGrant {
    /// Units of work allowed per period.
    pub budget: u64,
    /// Replenishment period.
    pub period: u64,
}

impl BudgetGrant {
    /// Create a grant. Validity is checked by [`BudgetGrant::is_valid`].
    pub fn new(budget: u64, period: u64) -> Self {
        Self { budget, period }
    }

    /// Check the `0 < budget <= period` invariant.
    pub fn is_valid(&self) -> bool {
        self.budget > 0 && self.budget <= self.period
    }

    /// Same period, different budget.
    pub fn with_budget(self, budget: u64) -> Self {
        Self { budget, ..self }
    }
}

impl fmt::Display for BudgetGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.budget, self.period)
    }
}
