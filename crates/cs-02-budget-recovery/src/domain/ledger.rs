//! Budget Ledger
//!
//! Per-client accounting for the extend policy.
//!
//! ```text
//! base ──fault──→ base+inc ──fault──→ base+2·inc ──…──→ ceiling ──fault──→ ceiling
//!   ↑                                                                          │
//!   └──────────────────────────── job_complete ────────────────────────────────┘
//! ```
//!
//! INVARIANT: for every client, `base.budget <= granted <= ceiling`, and
//! `granted` only decreases through `reset`.

use crate::error::{RecoveryError, RecoveryResult};
use serde::{Deserialize, Serialize};
use shared_types::{BudgetGrant, ThreadId};
use std::collections::HashMap;

/// Extend policy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendConfig {
    /// Grant every client starts from (and returns to on reset).
    pub base: BudgetGrant,
    /// Budget added per fault.
    pub increment: u64,
    /// Largest budget ever granted. At most the period.
    pub ceiling: u64,
}

impl Default for ExtendConfig {
    fn default() -> Self {
        Self {
            base: BudgetGrant::new(4, 16),
            increment: 2,
            ceiling: 16,
        }
    }
}

impl ExtendConfig {
    pub fn validate(&self) -> RecoveryResult<()> {
        if !self.base.is_valid() {
            return Err(RecoveryError::InvalidConfig(format!(
                "base grant {} is not 0 < budget <= period",
                self.base
            )));
        }
        if self.increment == 0 {
            return Err(RecoveryError::InvalidConfig(
                "extend increment must be positive".into(),
            ));
        }
        if self.ceiling < self.base.budget || self.ceiling > self.base.period {
            return Err(RecoveryError::InvalidConfig(format!(
                "ceiling {} outside [{}, {}]",
                self.ceiling, self.base.budget, self.base.period
            )));
        }
        Ok(())
    }
}

/// Result of one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension {
    pub grant: BudgetGrant,
    /// The grant did not grow because the ceiling was already reached.
    pub at_ceiling: bool,
}

/// Granted budget per client.
#[derive(Debug, Clone)]
pub struct BudgetLedger {
    config: ExtendConfig,
    granted: HashMap<ThreadId, u64>,
}

impl BudgetLedger {
    pub fn new(config: ExtendConfig) -> RecoveryResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            granted: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ExtendConfig {
        &self.config
    }

    /// Budget currently granted to `client`.
    pub fn granted(&self, client: ThreadId) -> u64 {
        self.granted
            .get(&client)
            .copied()
            .unwrap_or(self.config.base.budget)
    }

    /// Raise `client`'s grant by one increment, saturating at the ceiling.
    pub fn extend(&mut self, client: ThreadId) -> Extension {
        let current = self.granted(client);
        let next = current
            .saturating_add(self.config.increment)
            .min(self.config.ceiling);
        self.granted.insert(client, next);
        Extension {
            grant: self.config.base.with_budget(next),
            at_ceiling: next == current,
        }
    }

    /// Back to the base grant. Returns whether the client had been extended.
    pub fn reset(&mut self, client: ThreadId) -> bool {
        self.granted
            .remove(&client)
            .is_some_and(|granted| granted != self.config.base.budget)
    }

    /// Clients with a grant above base.
    pub fn extended_clients(&self) -> impl Iterator<Item = (ThreadId, u64)> + '_ {
        self.granted
            .iter()
            .filter(|(_, granted)| **granted > self.config.base.budget)
            .map(|(client, granted)| (*client, *granted))
    }
}
