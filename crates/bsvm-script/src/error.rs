/// Error type for script construction and decoding.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Invalid hex input.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Invalid data token encountered during ASM parsing.
    #[error("invalid opcode data")]
    InvalidOpcodeData,

    /// A push-data opcode was passed where a plain opcode was expected.
    #[error("use append_push_data for push data opcodes: {0}")]
    InvalidOpcodeType(String),

    /// A push ran past the end of the script.
    #[error("not enough data")]
    DataTooSmall,

    /// Push data exceeds what a PUSHDATA4 prefix can describe.
    #[error("data too big")]
    DataTooBig,

    /// One part of a multi-push encode exceeds protocol limits.
    #[error("part too big '{0}'")]
    PartTooBig(usize),

    /// Script is empty where content was required.
    #[error("script is empty")]
    EmptyScript,

    /// Script does not match the P2PKH pattern.
    #[error("not a P2PKH script")]
    NotP2pkh,
}
