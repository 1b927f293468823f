//! Cryptographic and serialization primitives for the bsvm workspace.
//!
//! Provides the building blocks the script engine and transaction crates
//! rest on:
//! - Hash functions (SHA-256, double SHA-256, SHA-1, RIPEMD-160, Hash160)
//! - secp256k1 ECDSA keys and signatures with DER encoding
//! - Bitcoin wire serialization helpers (VarInt, readers, writers)

pub mod ec;
pub mod hash;
pub mod util;

mod error;
pub use error::PrimitivesError;
