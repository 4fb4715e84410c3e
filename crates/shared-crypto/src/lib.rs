//! # Shared Crypto - Cipher Engine
//!
//! **Status:** Block-at-a-time CBC over AES-256
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `engine` | AES-256, CBC chaining step | Per-block hot path of the server |
//! | `padding` | PKCS#7 | Request boundaries only |
//!
//! ## Chaining Rule
//!
//! ```text
//! ciphertext[i] = E_k(plaintext[i] XOR vector[i])
//! vector[i + 1] = ciphertext[i]          (vector[0] = IV)
//! ```
//!
//! The engine is a pure function over fixed-size blocks: it has no runtime
//! failure modes. Only whole-buffer helpers can fail, and only on misaligned
//! input.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod errors;
pub mod padding;

// Re-exports
pub use engine::{cbc_decrypt, cbc_encrypt, decrypt_block, encrypt_block, CbcEngine, CipherKey};
pub use errors::CryptoError;
pub use padding::{depad, pad};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
