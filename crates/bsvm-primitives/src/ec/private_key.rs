//! secp256k1 private key scalar.

use k256::ecdsa::SigningKey;

use crate::ec::PublicKey;
use crate::PrimitivesError;

/// A secp256k1 private key.
///
/// Wraps a 32-byte scalar. Used by tests and signing helpers; the script
/// engine itself only ever verifies.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

impl PrivateKey {
    /// Create a private key from a 32-byte big-endian scalar.
    ///
    /// Fails on zero or on values at or above the curve order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let key = SigningKey::from_slice(bytes)
            .map_err(|e| PrimitivesError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey { key })
    }

    /// Create a private key from a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Return the 32-byte big-endian scalar.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.key.to_bytes());
        out
    }

    /// Derive the corresponding public key (compressed form).
    pub fn pub_key(&self) -> PublicKey {
        let compressed = self.key.verifying_key().to_sec1_bytes();
        PublicKey::from_bytes(&compressed).expect("derived key is always valid")
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.key
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "PrivateKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_roundtrip() {
        let bytes = [0x11u8; 32];
        let key = PrivateKey::from_bytes(&bytes).expect("valid key");
        assert_eq!(key.to_bytes(), bytes);
    }

    #[test]
    fn test_zero_key_rejected() {
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_pub_key_is_compressed() {
        let key = PrivateKey::from_bytes(&[0x22u8; 32]).expect("valid key");
        assert_eq!(key.pub_key().to_bytes().len(), 33);
    }
}
