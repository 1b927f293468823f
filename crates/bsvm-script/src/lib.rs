//! Bitcoin SV script representation.
//!
//! Provides the `Script` byte-string type, the consensus opcode table,
//! chunk-level decoding, and ASM round-trips. Script execution is the
//! `bsvm-interpreter` crate's job; this crate only describes scripts.

pub mod chunk;
pub mod opcodes;
pub mod script;

mod error;
pub use chunk::ScriptChunk;
pub use error::ScriptError;
pub use script::Script;
