#![deny(missing_docs)]

//! Bitcoin SV script virtual machine.
//!
//! Re-exports the workspace crates for single-dependency usage.

pub use bsvm_interpreter as interpreter;
pub use bsvm_primitives as primitives;
pub use bsvm_script as script;
pub use bsvm_transaction as transaction;
