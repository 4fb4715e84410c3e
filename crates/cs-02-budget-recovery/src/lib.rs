//! # cs-02-budget-recovery
//!
//! Budget-fault recovery controller for the interruptible cipher server.
//!
//! ## Overview
//!
//! When the server's scheduling budget runs out mid-request the kernel parks
//! it and raises a fault. The controller applies exactly one policy, chosen
//! per deployment:
//!
//! | Policy | Server | Progress | Client sees |
//! |--------|--------|----------|-------------|
//! | Rollback | passive | discarded (checkpoint restore) | `remaining = original_length` |
//! | Emergency | active, own context | kept | extra latency |
//! | Extend | passive | kept | extra latency |
//!
//! ## Architecture
//!
//! ```text
//! Kernel ──fault_wait──→ RecoveryController ──read_active──→ ServerHandle (cursor reader)
//!                              │
//!                              └── bind / unbind / configure / resume / revoke_reply ──→ Kernel
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use cs_02_budget_recovery::{RecoveryConfig, RecoveryController, RecoveryPolicy};
//!
//! let controller = RecoveryController::new(kernel, server_handle, RecoveryConfig {
//!     policy: RecoveryPolicy::Extend,
//!     ..RecoveryConfig::default()
//! })?;
//! let stats = controller.run(shutdown_rx).await?;
//! ```

pub mod domain;
pub mod error;
pub mod policies;
pub mod ports;
pub mod service;

pub use domain::{
    BudgetLedger, ExtendConfig, Extension, IgnoreReason, RecoveryOutcome, RecoveryPolicy,
    RecoveryStats,
};
pub use error::{RecoveryError, RecoveryResult};
pub use ports::RecoveryApi;
pub use service::{RecoveryConfig, RecoveryController};
