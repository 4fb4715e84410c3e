//! Domain module for budget-fault recovery
//!
//! ## Core Modules
//! - policy: Which recovery protocol a deployment runs
//! - ledger: Per-client budget accounting for the extend policy
//! - outcome: What handling one fault did, and running totals

pub mod ledger;
pub mod outcome;
pub mod policy;

pub use ledger::{BudgetLedger, Extension, ExtendConfig};
pub use outcome::{IgnoreReason, RecoveryOutcome, RecoveryStats};
pub use policy::RecoveryPolicy;
