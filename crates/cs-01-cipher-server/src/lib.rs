//! # cs-01-cipher-server
//!
//! Interruptible block-cipher server: CBC encryption one block at a time
//! under a budget-limited scheduler, with progress that is always safe to
//! observe.
//!
//! ## Overview
//!
//! - **Progress Snapshot**: `{vector, plaintext_cursor, ciphertext_cursor, remaining}`
//! - **Double-Buffered Cursor**: stage into the inactive slot, fence, flip
//! - **Request Protocol**: new requests (`vector = None`) or resumed ones
//! - **Server loop**: charge, encrypt, publish; restore on checkpoint
//!
//! ## Architecture
//!
//! ```text
//! Client ──Request──→ CipherServer ──charge / recv / reply──→ Kernel
//!                         │
//!                         └── CursorWriter ──publish──→ CursorReader ──→ Recovery controller
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use cs_01_cipher_server::{CipherClient, CipherServer, ServerConfig, SharedRegion};
//!
//! let server = CipherServer::new(kernel.clone(), server_thread, &key, ServerConfig::default(), region);
//! let handle = server.handle();
//! tokio::spawn(server.run());
//!
//! let client = CipherClient::new(kernel, client_thread, handle);
//! let ciphertext = client.encrypt(b"attack at dawn").await?;
//! ```

pub mod client;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use client::CipherClient;
pub use domain::{
    double_buffered_cursor, CursorReader, CursorWriter, ServerPhase, ServerStatus, SharedRegion,
    Snapshot,
};
pub use error::{CipherError, CipherResult};
pub use ports::{CheckpointPort, CipherServerApi, FaultPort, IpcPort, Kernel, SchedulingPort};
pub use service::{CipherServer, ServerConfig, ServerHandle};
