//! Driven Ports (SPI - Outbound)
//!
//! The kernel primitives the server consumes. The traits are defined in
//! `shared-types` so that a kernel implementation does not need to depend on
//! this crate.

pub use shared_types::ports::{CheckpointPort, FaultPort, IpcPort, Kernel, SchedulingPort};
