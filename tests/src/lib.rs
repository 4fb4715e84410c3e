//! # Cipher-Server Test Suite
//!
//! Unified test crate for flows that span several crates.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── cipher_benchmarks.rs  # Block step, cursor, end-to-end request
//! └── src/integration/
//!     ├── mod.rs                # Harness: kernel + server + clients
//!     ├── cipher_flows.rs       # Request protocol, known-answer vectors
//!     ├── recovery_flows.rs     # Rollback, emergency, extend
//!     └── runtime_flows.rs      # Full deployments from configuration
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p cs-tests
//!
//! # By category
//! cargo test -p cs-tests integration::recovery_flows::
//!
//! # Benchmarks
//! cargo bench -p cs-tests
//! ```

#![allow(dead_code)]

pub mod integration;
