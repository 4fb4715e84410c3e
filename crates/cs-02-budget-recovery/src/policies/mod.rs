//! The three recovery protocols.
//!
//! Each runs its kernel operations in a fixed order and only lets the server
//! run again (`resume`) once its capability set is complete.

pub mod emergency;
pub mod extend;
pub mod rollback;
