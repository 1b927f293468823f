//! Interpreter error kinds.
//!
//! Errors are identified by `ErrorCode`; the description string is
//! diagnostic only and callers must not match on it.

use std::fmt;

/// Identifies a kind of script error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Internal consistency failure. Seeing this means a bug in the
    /// engine itself.
    Internal,
    /// Sentinel for early successful termination (post-Genesis
    /// OP_RETURN). Never surfaces to callers.
    Ok,

    // Improper API usage.
    InvalidFlags,
    InvalidIndex,
    InvalidParams,

    // Final execution state.
    EarlyReturn,
    EmptyStack,
    EvalFalse,
    ScriptUnfinished,
    InvalidProgramCounter,

    // Exceeded limits.
    ScriptTooBig,
    ElementTooBig,
    TooManyOperations,
    StackOverflow,
    InvalidPubKeyCount,
    InvalidSignatureCount,
    NumberTooBig,
    NumberTooSmall,

    // Arithmetic.
    DivideByZero,

    // Verify-family opcodes popping false.
    Verify,
    EqualVerify,
    NumEqualVerify,
    CheckSigVerify,
    CheckMultiSigVerify,

    // Opcode failures.
    BadOpcode,
    DisabledOpcode,
    ReservedOpcode,
    MalformedPush,
    DiscourageUpgradableNOPs,

    // Stack and control flow.
    InvalidStackOperation,
    UnbalancedConditional,
    InvalidInputLength,

    // Encoding.
    MinimalData,
    MinimalIf,
    NotPushOnly,
    InvalidSigHashType,
    SigTooShort,
    SigTooLong,
    SigInvalidSeqID,
    SigInvalidDataLen,
    SigMissingSTypeID,
    SigMissingSLen,
    SigInvalidSLen,
    SigInvalidRIntID,
    SigZeroRLen,
    SigNegativeR,
    SigTooMuchRPadding,
    SigInvalidSIntID,
    SigZeroSLen,
    SigNegativeS,
    SigTooMuchSPadding,
    SigHighS,
    SigNullDummy,
    NullFail,
    PubKeyType,
    IllegalForkID,
    CleanStack,

    // Locktime.
    NegativeLockTime,
    UnsatisfiedLockTime,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A script interpreter error: a kind plus a diagnostic string.
#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub description: String,
}

impl Error {
    pub fn new(code: ErrorCode, description: String) -> Self {
        Error { code, description }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl std::error::Error for Error {}

/// Check whether `err` carries the given code.
pub fn is_error_code(err: &Error, code: ErrorCode) -> bool {
    err.code == code
}
