//! Ports module for the cipher server

pub mod inbound;
pub mod outbound;

pub use inbound::CipherServerApi;
pub use outbound::{CheckpointPort, FaultPort, IpcPort, Kernel, SchedulingPort};
