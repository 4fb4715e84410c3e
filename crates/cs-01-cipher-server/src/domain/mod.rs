//! Domain module for the cipher server
//!
//! ## Core Modules
//! - snapshot: Progress record of one request
//! - cursor: Double-buffered, lock-free publication of snapshots
//! - request: New/resume request validation
//! - region: Shared plaintext/ciphertext buffers
//! - status: Idle/active phase published to observers

pub mod cursor;
pub mod region;
pub mod request;
pub mod snapshot;
pub mod status;

pub use cursor::{double_buffered_cursor, CursorReader, CursorWriter};
pub use region::SharedRegion;
pub use request::{initial_snapshot, RequestDefaults};
pub use snapshot::Snapshot;
pub use status::{ServerPhase, ServerStatus};
