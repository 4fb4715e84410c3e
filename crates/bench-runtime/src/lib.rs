//! # Bench Runtime Library
//!
//! Wires a simulated kernel, one cipher server, its clients and a recovery
//! controller into a [`Deployment`], and drives a round-robin workload
//! against it. The `bench-runtime` binary is a thin wrapper around this.
//!
//! ## Startup Sequence
//!
//! 1. Load [`RuntimeConfig`] from the environment and validate it
//! 2. Create the server thread (with its own context only under emergency)
//! 3. Spawn the server loop and the recovery controller
//! 4. Create and bind one context per client
//! 5. Run the workload, then shut the controller down

pub mod config;
pub mod deployment;
pub mod driver;
pub mod error;

pub use config::{BudgetConfig, CipherConfig, ConfigError, RuntimeConfig, WorkloadConfig};
pub use deployment::{ClientSlot, Deployment};
pub use driver::{JobOutcome, RunReport};
pub use error::{RuntimeError, RuntimeResult};
