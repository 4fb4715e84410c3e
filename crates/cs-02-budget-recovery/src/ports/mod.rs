//! Ports module for budget-fault recovery
//!
//! The controller drives the kernel through the outbound ports re-exported
//! by the cipher server crate.

pub mod inbound;

pub use inbound::RecoveryApi;
