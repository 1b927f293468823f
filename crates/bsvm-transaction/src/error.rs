/// Error type for transaction construction and serialization.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// Malformed or internally inconsistent transaction data.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Binary deserialization failure.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Invalid hex input.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Error bubbled up from the script crate.
    #[error("script error: {0}")]
    Script(#[from] bsvm_script::ScriptError),

    /// Error bubbled up from the primitives crate.
    #[error("primitives error: {0}")]
    Primitives(#[from] bsvm_primitives::PrimitivesError),
}
