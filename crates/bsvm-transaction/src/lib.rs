//! Bitcoin SV transaction model.
//!
//! `Transaction`, `TransactionInput`, and `TransactionOutput` with wire
//! (de)serialization, plus the signature hash computation the script
//! engine's checksig opcodes call into. Both the post-fork (fork-id,
//! BIP143-style) and legacy preimage algorithms are provided.

pub mod input;
pub mod output;
pub mod sighash;
pub mod template;
pub mod transaction;

mod error;
pub use error::TransactionError;
pub use input::TransactionInput;
pub use output::TransactionOutput;
pub use transaction::Transaction;
