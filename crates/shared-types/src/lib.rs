//! # Shared Types Crate
//!
//! This crate contains the entities, IPC messages and error types that travel
//! between the cipher server, its clients, the recovery controller and the
//! kernel that schedules them.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary is
//!   defined here.
//! - **Resumption travels in the message**: a `Request` carries everything the
//!   server needs to continue a partially completed job, so the server never
//!   has to remember a client between calls.
//! - **Environment behind ports**: scheduling, checkpoint, fault delivery and
//!   call/reply are traits in [`ports`]; any kernel that implements them can
//!   host the server.
//! - **Kernel failures are fatal**: `KernelError` describes a misconfigured or
//!   exhausted environment, never an expected runtime condition.

pub mod entities;
pub mod errors;
pub mod ipc;
pub mod ports;

pub use entities::*;
pub use errors::*;
pub use ipc::*;
pub use ports::*;
