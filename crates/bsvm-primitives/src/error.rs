/// Error type for primitives operations.
///
/// Covers key parsing, signature decoding, and binary deserialization
/// failures.
#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    /// Invalid private key data.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Invalid public key data.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature data.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Invalid hex input.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// A reader ran past the end of its input.
    #[error("unexpected end of data: {0}")]
    UnexpectedEof(String),
}
