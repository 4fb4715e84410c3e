//! # sim-kernel
//!
//! An in-process stand-in for a capability microkernel with budgeted
//! scheduling contexts (seL4 MCS style). It provides exactly the primitives
//! the cipher server and recovery controller consume through the
//! `shared_types::ports` traits:
//!
//! - **Scheduling contexts** with budget/period. `charge` deducts budget and
//!   parks the thread on exhaustion, raising a [`FaultEvent`].
//! - **Checkpoints** that make a parked thread abandon its work on wake.
//! - **Call/reply** with reply caps that can be revoked and answered later.
//! - **Donation**: a server with no context of its own runs on its caller's
//!   context for the duration of the call.
//!
//! ## Parking
//!
//! ```text
//! charge ──budget left──→ Continue
//!   │
//!   ├── exhausted ──→ [Parked: BudgetExhausted] ──resume──→ Continue | Restore(cp)
//!   │                        └── emits FaultEvent
//!   └── no context ──→ [Parked: NoContext] ──bind / next_period / donation──→ retry
//! ```
//!
//! Time is not simulated: a period boundary happens when the owner calls
//! [`SimKernel::next_period`].
//!
//! [`FaultEvent`]: shared_types::FaultEvent

pub mod kernel;
pub mod state;

pub use kernel::SimKernel;
pub use state::ParkReason;
