//! secp256k1 elliptic curve types.
//!
//! Wraps the `k256` crate behind the key and signature types the rest of
//! the workspace uses: SEC1 public keys, 32-byte private scalars, and
//! DER-encoded ECDSA signatures with low-S normalization.

mod private_key;
mod public_key;
mod signature;

pub use private_key::PrivateKey;
pub use public_key::PublicKey;
pub use signature::Signature;
