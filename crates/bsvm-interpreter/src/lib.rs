//! Bitcoin SV script interpreter.
//!
//! A stack-based virtual machine that decides whether an unlocking
//! script satisfies a locking script under full BSV consensus
//! semantics: variable-width script numbers, conditional control flow,
//! signature verification against transaction signature hashes, P2SH
//! re-entry, and the pre/post-Genesis limit split.
//!
//! # Example
//!
//! ```ignore
//! use bsvm_interpreter::{Engine, ExecutionOptions};
//!
//! Engine::new().execute(
//!     ExecutionOptions::new()
//!         .with_tx(&tx, input_idx, &prev_output)
//!         .fork_id()
//!         .after_genesis(),
//! )?;
//! ```

pub mod config;
pub mod debug;
pub mod error;
pub mod flags;
pub mod options;
pub mod parsed_opcode;
pub mod scriptnum;
pub mod stack;
pub mod thread;

mod ops_arithmetic;
mod ops_crypto;
mod ops_data;
mod ops_flow;
mod ops_stack;

pub use config::Config;
pub use debug::{Debugger, NopDebugger, State};
pub use error::{is_error_code, Error, ErrorCode};
pub use flags::ScriptFlags;
pub use options::ExecutionOptions;
pub use parsed_opcode::{disassemble, parse_script, ParsedOpcode, ParsedScript};
pub use scriptnum::ScriptNumber;
pub use stack::Stack;
pub use thread::Thread;

/// The script execution engine.
///
/// Stateless; every `execute` call builds and runs its own thread, so
/// one engine may serve concurrent callers on disjoint inputs.
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Engine
    }

    /// Execute the scripts described by `opts` to completion.
    ///
    /// Returns `Ok(())` when execution ends with a truthy top-of-stack
    /// (and a clean stack, when required); the specific [`ErrorCode`]
    /// otherwise.
    pub fn execute(&self, opts: ExecutionOptions<'_>) -> Result<(), Error> {
        let mut thread = Thread::new(opts)?;
        thread.execute()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsvm_script::opcodes::*;
    use bsvm_script::Script;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn exec(unlock: &[u8], lock: &[u8], flags: ScriptFlags) -> Result<(), Error> {
        let unlocking = Script::from_bytes(unlock);
        let locking = Script::from_bytes(lock);
        Engine::new().execute(
            ExecutionOptions::new()
                .with_scripts(&locking, &unlocking)
                .with_flags(flags),
        )
    }

    fn exec_hex(unlock: &str, lock: &str, flags: ScriptFlags) -> Result<(), Error> {
        exec(
            &hex::decode(unlock).unwrap(),
            &hex::decode(lock).unwrap(),
            flags,
        )
    }

    const GENESIS: ScriptFlags = ScriptFlags::UTXO_AFTER_GENESIS;

    #[test]
    fn test_equal() {
        assert!(exec(&[OP_1], &[OP_1, OP_EQUAL], ScriptFlags::NONE).is_ok());
        let err = exec(&[OP_1], &[OP_2, OP_EQUAL], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::EvalFalse);
    }

    #[test]
    fn test_add_sub() {
        assert!(exec(&[OP_2, OP_3], &[OP_ADD, OP_5, OP_EQUAL], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_5, OP_3], &[OP_SUB, OP_2, OP_EQUAL], ScriptFlags::NONE).is_ok());
    }

    #[test]
    fn test_mul_div_mod() {
        assert!(exec(&[OP_3, OP_4], &[OP_MUL, OP_12, OP_EQUAL], GENESIS).is_ok());
        assert!(exec(&[OP_6, OP_3], &[OP_DIV, OP_2, OP_EQUAL], GENESIS).is_ok());
        assert!(exec(&[OP_7, OP_3], &[OP_MOD, OP_1, OP_EQUAL], GENESIS).is_ok());
    }

    #[test]
    fn test_div_by_zero() {
        let err = exec(&[OP_6, OP_0], &[OP_DIV], GENESIS).unwrap_err();
        assert_eq!(err.code, ErrorCode::DivideByZero);
        let err = exec(&[OP_6, OP_0], &[OP_MOD], GENESIS).unwrap_err();
        assert_eq!(err.code, ErrorCode::DivideByZero);
    }

    #[test]
    fn test_spec_arithmetic_script() {
        // OP_4 OP_6 | OP_2 OP_3 OP_MUL OP_EQUALVERIFY OP_2 OP_2 OP_ADD
        // OP_EQUAL
        assert!(exec_hex("5456", "5253958852529387", GENESIS).is_ok());
        // With OP_7 on the stack the inner OP_EQUALVERIFY fails.
        let err = exec_hex("5457", "5253958852529387", GENESIS).unwrap_err();
        assert_eq!(err.code, ErrorCode::EqualVerify);
    }

    #[test]
    fn test_hash160_matches_sha_ripemd_composition() {
        // OP_DUP OP_HASH160 OP_SWAP OP_SHA256 OP_RIPEMD160 OP_EQUAL
        // over the empty push.
        assert!(exec_hex("00", "76a97ca8a687", GENESIS).is_ok());
    }

    #[test]
    fn test_p2pkh_hash_path() {
        use bsvm_primitives::hash::hash160;
        let pubkey = vec![0x04; 33];
        let h = hash160(&pubkey);

        let mut unlock = vec![pubkey.len() as u8];
        unlock.extend_from_slice(&pubkey);

        let mut lock = vec![OP_DUP, OP_HASH160, h.len() as u8];
        lock.extend_from_slice(&h);
        lock.extend_from_slice(&[OP_EQUALVERIFY, OP_1]);

        assert!(exec(&unlock, &lock, ScriptFlags::NONE).is_ok());
    }

    #[test]
    fn test_if_else_endif() {
        assert!(exec(&[], &[OP_1, OP_IF, OP_2, OP_ELSE, OP_3, OP_ENDIF], ScriptFlags::NONE).is_ok());
        assert!(exec(&[], &[OP_0, OP_IF, OP_0, OP_ELSE, OP_2, OP_ENDIF], ScriptFlags::NONE).is_ok());
        assert!(exec(&[], &[OP_0, OP_NOTIF, OP_1, OP_ELSE, OP_0, OP_ENDIF], ScriptFlags::NONE).is_ok());
    }

    #[test]
    fn test_nested_if() {
        assert!(exec(
            &[],
            &[OP_1, OP_IF, OP_1, OP_IF, OP_2, OP_ENDIF, OP_ENDIF],
            ScriptFlags::NONE
        )
        .is_ok());
        // The inner IF in a dead branch must still balance.
        assert!(exec(
            &[],
            &[OP_0, OP_IF, OP_1, OP_IF, OP_2, OP_ENDIF, OP_ENDIF, OP_1],
            ScriptFlags::NONE
        )
        .is_ok());
    }

    #[test]
    fn test_unbalanced_conditional() {
        let err = exec(&[OP_1], &[OP_IF], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnbalancedConditional);

        let err = exec(&[OP_1], &[OP_ENDIF], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnbalancedConditional);

        let err = exec(&[OP_1], &[OP_ELSE, OP_1], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnbalancedConditional);
    }

    #[test]
    fn test_double_else_rejected() {
        let err = exec(
            &[],
            &[OP_1, OP_IF, OP_2, OP_ELSE, OP_3, OP_ELSE, OP_4, OP_ENDIF],
            ScriptFlags::NONE,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnbalancedConditional);
    }

    #[test]
    fn test_op_return_before_genesis() {
        let err = exec(&[OP_1], &[OP_RETURN], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::EarlyReturn);
    }

    #[test]
    fn test_op_return_after_genesis() {
        // Unconditional OP_RETURN: early success with a truthy stack.
        assert!(exec(&[OP_1], &[OP_1, OP_RETURN, 0x01, 0x02, 0x03], GENESIS).is_ok());
        // A falsy stack still fails.
        let err = exec(&[OP_0], &[OP_RETURN], GENESIS).unwrap_err();
        assert_eq!(err.code, ErrorCode::EvalFalse);
    }

    #[test]
    fn test_op_return_in_conditional_after_genesis() {
        // OP_RETURN inside an executed branch marks early return; the
        // remaining conditionals still must balance.
        assert!(exec(
            &[OP_1],
            &[OP_1, OP_IF, OP_RETURN, OP_ENDIF, OP_5],
            GENESIS
        )
        .is_ok());
        // Unbalanced tail after the early return is still an error.
        let err = exec(&[OP_1], &[OP_1, OP_IF, OP_RETURN], GENESIS).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnbalancedConditional);
    }

    #[test]
    fn test_verify() {
        let err = exec(&[OP_0], &[OP_VERIFY], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::Verify);
        assert!(exec(&[OP_1, OP_1], &[OP_VERIFY], ScriptFlags::NONE).is_ok());
    }

    #[test]
    fn test_depth_size() {
        assert!(exec(&[OP_1, OP_2, OP_3], &[OP_DEPTH, OP_3, OP_EQUAL], ScriptFlags::NONE).is_ok());
        assert!(exec(
            &[0x03, 0xaa, 0xbb, 0xcc],
            &[OP_SIZE, OP_3, OP_EQUALVERIFY, OP_1],
            ScriptFlags::NONE
        )
        .is_ok());
    }

    #[test]
    fn test_stack_ops() {
        // ROT: [1 2 3] -> [2 3 1]
        assert!(exec(
            &[OP_1, OP_2, OP_3],
            &[OP_ROT, OP_1, OP_EQUALVERIFY, OP_3, OP_EQUALVERIFY, OP_2, OP_EQUAL],
            ScriptFlags::NONE
        )
        .is_ok());
        // TUCK: [1 2] -> [2 1 2]
        assert!(exec(
            &[OP_1, OP_2],
            &[OP_TUCK, OP_2, OP_EQUALVERIFY, OP_1, OP_EQUALVERIFY, OP_2, OP_EQUAL],
            ScriptFlags::NONE
        )
        .is_ok());
        // 2DUP
        assert!(exec(
            &[OP_1, OP_2],
            &[
                OP_2DUP, OP_2, OP_EQUALVERIFY, OP_1, OP_EQUALVERIFY, OP_2, OP_EQUALVERIFY, OP_1,
                OP_EQUAL
            ],
            ScriptFlags::NONE
        )
        .is_ok());
        // PICK copies, ROLL moves.
        assert!(exec(
            &[OP_1, OP_2, OP_3, OP_2],
            &[
                OP_PICK, OP_1, OP_EQUALVERIFY, OP_3, OP_EQUALVERIFY, OP_2, OP_EQUALVERIFY, OP_1,
                OP_EQUAL
            ],
            ScriptFlags::NONE
        )
        .is_ok());
    }

    #[test]
    fn test_alt_stack() {
        assert!(exec(
            &[OP_5],
            &[OP_TOALTSTACK, OP_FROMALTSTACK, OP_5, OP_EQUAL],
            ScriptFlags::NONE
        )
        .is_ok());
        // Popping an empty alt stack fails.
        let err = exec(&[OP_1], &[OP_FROMALTSTACK], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStackOperation);
    }

    #[test]
    fn test_ifdup() {
        assert!(exec(&[OP_1], &[OP_IFDUP, OP_EQUAL], ScriptFlags::NONE).is_ok());
    }

    #[test]
    fn test_cat_split() {
        assert!(exec(
            &[0x01, 0xaa, 0x01, 0xbb],
            &[OP_CAT, 0x02, 0xaa, 0xbb, OP_EQUAL],
            GENESIS
        )
        .is_ok());
        assert!(exec(
            &[0x02, 0xaa, 0xbb, OP_1],
            &[OP_SPLIT, 0x01, 0xbb, OP_EQUALVERIFY, 0x01, 0xaa, OP_EQUAL],
            GENESIS
        )
        .is_ok());
    }

    #[test]
    fn test_num2bin_bin2num() {
        // 2 NUM2BIN over the number 1 widens to [0x01, 0x00].
        assert!(exec(
            &[OP_1, OP_2],
            &[OP_NUM2BIN, 0x02, 0x01, 0x00, OP_EQUAL],
            GENESIS
        )
        .is_ok());
        // BIN2NUM reduces it back.
        assert!(exec(
            &[0x02, 0x01, 0x00],
            &[OP_BIN2NUM, OP_1, OP_EQUAL],
            GENESIS
        )
        .is_ok());
    }

    #[test]
    fn test_bitwise() {
        assert!(exec(
            &[0x01, 0x00],
            &[OP_INVERT, 0x01, 0xff, OP_EQUAL],
            GENESIS
        )
        .is_ok());
        assert!(exec(
            &[0x01, 0xff, 0x01, 0x0f],
            &[OP_AND, 0x01, 0x0f, OP_EQUAL],
            GENESIS
        )
        .is_ok());
        assert!(exec(
            &[0x01, 0xf0, 0x01, 0x0f],
            &[OP_OR, 0x01, 0xff, OP_EQUAL],
            GENESIS
        )
        .is_ok());
        assert!(exec(
            &[0x01, 0xff, 0x01, 0xff],
            &[OP_XOR, 0x01, 0x00, OP_EQUAL],
            GENESIS
        )
        .is_ok());
        // Mismatched operand lengths.
        let err = exec(&[0x01, 0xff, 0x02, 0x0f, 0x0f], &[OP_AND], GENESIS).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInputLength);
    }

    #[test]
    fn test_shifts() {
        // [0x01] << 1 = [0x02]
        assert!(exec(
            &[0x01, 0x01, OP_1],
            &[OP_LSHIFT, 0x01, 0x02, OP_EQUAL],
            GENESIS
        )
        .is_ok());
        // [0x02] >> 1 = [0x01]
        assert!(exec(
            &[0x01, 0x02, OP_1],
            &[OP_RSHIFT, 0x01, 0x01, OP_EQUAL],
            GENESIS
        )
        .is_ok());
        // Shifting an n-byte element by >= 8n bits zeroes it in place.
        assert!(exec(
            &[0x01, 0xff, OP_9],
            &[OP_RSHIFT, 0x01, 0x00, OP_EQUAL],
            GENESIS
        )
        .is_ok());
        // Negative count fails.
        let err = exec(&[0x01, 0x01, OP_1NEGATE], &[OP_LSHIFT], GENESIS).unwrap_err();
        assert_eq!(err.code, ErrorCode::NumberTooSmall);
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(exec(&[OP_5, OP_5], &[OP_NUMEQUAL], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_3, OP_5], &[OP_LESSTHAN], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_5, OP_3], &[OP_GREATERTHAN], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_3, OP_5], &[OP_MIN, OP_3, OP_EQUAL], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_3, OP_5], &[OP_MAX, OP_5, OP_EQUAL], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_3, OP_2, OP_5], &[OP_WITHIN], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_1, OP_1], &[OP_BOOLAND], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_1, OP_0], &[OP_BOOLAND, OP_NOT], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_1NEGATE], &[OP_ABS, OP_1, OP_EQUAL], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_1], &[OP_NEGATE, OP_1NEGATE, OP_EQUAL], ScriptFlags::NONE).is_ok());
        assert!(exec(&[OP_0], &[OP_NOT], ScriptFlags::NONE).is_ok());
    }

    #[test]
    fn test_disabled_opcodes() {
        let err = exec(&[OP_1], &[OP_2MUL], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::DisabledOpcode);
        let err = exec(&[OP_1], &[OP_2DIV], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::DisabledOpcode);

        // Before Genesis, disabled opcodes fail even in unexecuted
        // branches.
        let err = exec(
            &[],
            &[OP_0, OP_IF, OP_2MUL, OP_ENDIF, OP_1],
            ScriptFlags::NONE,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DisabledOpcode);

        // After Genesis, a skipped disabled opcode is tolerated.
        assert!(exec(&[], &[OP_0, OP_IF, OP_2MUL, OP_ENDIF, OP_1], GENESIS).is_ok());
    }

    #[test]
    fn test_verif_vernotif() {
        // Always illegal before Genesis, executed or not.
        let err = exec(
            &[],
            &[OP_0, OP_IF, OP_VERIF, OP_ENDIF, OP_1],
            ScriptFlags::NONE,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ReservedOpcode);

        // After Genesis a skipped OP_VERIF is tolerated.
        assert!(exec(&[], &[OP_0, OP_IF, OP_VERIF, OP_ENDIF, OP_1], GENESIS).is_ok());
        // But an executed one is still reserved.
        let err = exec(&[], &[OP_1, OP_IF, OP_VERIF, OP_ENDIF, OP_1], GENESIS).unwrap_err();
        assert_eq!(err.code, ErrorCode::ReservedOpcode);
    }

    #[test]
    fn test_reserved_opcodes() {
        for op in [OP_RESERVED, OP_VER, OP_RESERVED1, OP_RESERVED2, 0xba, 0xff] {
            let err = exec(&[OP_1], &[op], ScriptFlags::NONE).unwrap_err();
            assert_eq!(err.code, ErrorCode::ReservedOpcode, "opcode {:#x}", op);
        }
    }

    #[test]
    fn test_upgradable_nops() {
        assert!(exec(&[OP_1], &[OP_NOP1, OP_NOP10], ScriptFlags::NONE).is_ok());
        let err = exec(
            &[OP_1],
            &[OP_NOP1],
            ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DiscourageUpgradableNOPs);
    }

    #[test]
    fn test_element_size_boundary() {
        // An 80-byte push is fine before Genesis.
        let mut unlock = vec![OP_PUSHDATA1, 80];
        unlock.extend_from_slice(&[0xaa; 80]);
        assert!(exec(&unlock, &[OP_SIZE, OP_PUSHDATA1, 1, 80, OP_EQUALVERIFY, OP_1], ScriptFlags::NONE).is_ok());

        // A 520-byte element is exactly at the cap.
        let mut unlock = vec![OP_PUSHDATA2];
        unlock.extend_from_slice(&520u16.to_le_bytes());
        unlock.extend_from_slice(&[0xbb; 520]);
        assert!(exec(&unlock, &[OP_DROP, OP_1], ScriptFlags::NONE).is_ok());

        // 521 bytes exceeds it.
        let mut unlock = vec![OP_PUSHDATA2];
        unlock.extend_from_slice(&521u16.to_le_bytes());
        unlock.extend_from_slice(&[0xbb; 521]);
        let err = exec(&unlock, &[OP_DROP, OP_1], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::ElementTooBig);

        // After Genesis the same push is accepted.
        let mut unlock = vec![OP_PUSHDATA2];
        unlock.extend_from_slice(&521u16.to_le_bytes());
        unlock.extend_from_slice(&[0xbb; 521]);
        assert!(exec(&unlock, &[OP_DROP, OP_1], GENESIS).is_ok());
    }

    #[test]
    fn test_too_many_operations() {
        // 500 non-push ops are allowed before Genesis, 501 are not.
        let mut lock = vec![OP_1];
        lock.extend_from_slice(&vec![OP_NOP; 500]);
        assert!(exec(&[], &lock, ScriptFlags::NONE).is_ok());

        let mut lock = vec![OP_1];
        lock.extend_from_slice(&vec![OP_NOP; 501]);
        let err = exec(&[], &lock, ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::TooManyOperations);

        // The same script is fine after Genesis.
        let mut lock = vec![OP_1];
        lock.extend_from_slice(&vec![OP_NOP; 501]);
        assert!(exec(&[], &lock, GENESIS).is_ok());
    }

    #[test]
    fn test_ops_counted_in_dead_branches() {
        // Non-push opcodes count toward the limit even when skipped.
        let mut lock = vec![OP_0, OP_IF];
        lock.extend_from_slice(&vec![OP_NOP; 500]);
        lock.extend_from_slice(&[OP_ENDIF, OP_1]);
        let err = exec(&[], &lock, ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::TooManyOperations);
    }

    #[test]
    fn test_stack_overflow() {
        let unlock = vec![OP_1; 1000];
        assert!(exec(&unlock, &[OP_1], ScriptFlags::NONE).is_err());

        let unlock = vec![OP_1; 999];
        // 999 pushes + OP_1 from the locking script = 1000, at the cap.
        assert!(exec(&unlock, &[OP_1], ScriptFlags::NONE).is_ok());

        let unlock = vec![OP_1; 1001];
        let err = exec(&unlock, &[OP_DROP, OP_1], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::StackOverflow);
    }

    #[test]
    fn test_script_too_big() {
        let unlock = vec![OP_NOP; 10001];
        let err = exec(&unlock, &[OP_1], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::ScriptTooBig);
    }

    #[test]
    fn test_empty_scripts_eval_false() {
        let err = exec(&[], &[], ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::EvalFalse);
    }

    #[test]
    fn test_clean_stack_requires_bip16() {
        let err = exec(&[OP_1], &[OP_1], ScriptFlags::VERIFY_CLEAN_STACK).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFlags);
    }

    #[test]
    fn test_clean_stack() {
        let flags = ScriptFlags::VERIFY_CLEAN_STACK | ScriptFlags::BIP16;
        // Two leftovers fail.
        let err = exec(&[OP_1, OP_1], &[OP_1], flags).unwrap_err();
        assert_eq!(err.code, ErrorCode::CleanStack);
        // Exactly one passes.
        assert!(exec(&[OP_1], &[OP_1, OP_EQUAL], flags).is_ok());
    }

    #[test]
    fn test_sig_push_only() {
        let err = exec(
            &[OP_1, OP_1, OP_ADD],
            &[OP_2, OP_EQUAL],
            ScriptFlags::VERIFY_SIG_PUSH_ONLY,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotPushOnly);
        assert!(exec(
            &[OP_1, OP_2],
            &[OP_ADD, OP_3, OP_EQUAL],
            ScriptFlags::VERIFY_SIG_PUSH_ONLY
        )
        .is_ok());
    }

    #[test]
    fn test_minimal_data() {
        // The value 5 pushed as OP_DATA_1 0x05 is non-minimal.
        let err = exec(
            &[0x01, 0x05],
            &[OP_5, OP_EQUAL],
            ScriptFlags::VERIFY_MINIMAL_DATA,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MinimalData);
        // Without the flag it runs.
        assert!(exec(&[0x01, 0x05], &[OP_5, OP_EQUAL], ScriptFlags::NONE).is_ok());
    }

    #[test]
    fn test_minimal_if() {
        let err = exec(
            &[OP_2],
            &[OP_IF, OP_1, OP_ENDIF],
            ScriptFlags::VERIFY_MINIMAL_IF,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MinimalIf);
        assert!(exec(&[OP_1], &[OP_IF, OP_1, OP_ENDIF], ScriptFlags::VERIFY_MINIMAL_IF).is_ok());
        // Any truthy value works without the flag.
        assert!(exec(&[OP_2], &[OP_IF, OP_1, OP_ENDIF], ScriptFlags::NONE).is_ok());
    }

    #[test]
    fn test_p2sh_redeem_script() {
        use bsvm_primitives::hash::hash160;
        // Redeem script: OP_1.
        let redeem = [OP_1];
        let h = hash160(&redeem);

        // Unlocking: push the redeem script.
        let unlock = vec![0x01, OP_1];
        // Locking: OP_HASH160 <h> OP_EQUAL.
        let mut lock = vec![OP_HASH160, 0x14];
        lock.extend_from_slice(&h);
        lock.push(OP_EQUAL);

        let flags = ScriptFlags::BIP16 | ScriptFlags::VERIFY_CLEAN_STACK;
        assert!(exec(&unlock, &lock, flags).is_ok());

        // The same spend without BIP16 just compares hashes and leaves
        // the redeem push unexecuted.
        assert!(exec(&unlock, &lock, ScriptFlags::NONE).is_ok());

        // A wrong redeem script fails the hash comparison.
        let bad_unlock = vec![0x01, OP_2];
        let err = exec(&bad_unlock, &lock, flags).unwrap_err();
        assert_eq!(err.code, ErrorCode::EvalFalse);
    }

    #[test]
    fn test_p2sh_requires_push_only_unlock() {
        use bsvm_primitives::hash::hash160;
        let redeem = [OP_1];
        let h = hash160(&redeem);
        let mut lock = vec![OP_HASH160, 0x14];
        lock.extend_from_slice(&h);
        lock.push(OP_EQUAL);

        // OP_NOP in the unlocking script of a P2SH spend.
        let unlock = vec![OP_NOP, 0x01, OP_1];
        let err = exec(&unlock, &lock, ScriptFlags::BIP16).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotPushOnly);
    }

    #[test]
    fn test_p2sh_nontrivial_redeem() {
        use bsvm_primitives::hash::hash160;
        // Redeem script: OP_2 OP_EQUAL.
        let redeem = [OP_2, OP_EQUAL];
        let h = hash160(&redeem);

        // Unlocking: push 2, then the redeem script.
        let unlock = vec![0x01, 0x02, 0x02, OP_2, OP_EQUAL];
        let mut lock = vec![OP_HASH160, 0x14];
        lock.extend_from_slice(&h);
        lock.push(OP_EQUAL);

        let flags = ScriptFlags::BIP16 | ScriptFlags::VERIFY_CLEAN_STACK;
        assert!(exec(&unlock, &lock, flags).is_ok());
    }

    #[test]
    fn test_malformed_push_fails_when_reached() {
        // OP_PUSHDATA1 claiming five bytes with two available.
        let err = exec_hex("4c050102", "51", ScriptFlags::NONE).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedPush);

        // Unreached behind an early return it is harmless.
        assert!(exec_hex("51", "516a4c0501", GENESIS).is_ok());
    }

    #[test]
    fn test_invalid_program_counter_via_step() {
        let unlocking = Script::from_bytes(&[OP_1]);
        let locking = Script::from_bytes(&[OP_1, OP_EQUAL]);
        let mut thread = Thread::new(
            ExecutionOptions::new().with_scripts(&locking, &unlocking),
        )
        .unwrap();
        loop {
            if thread.step().unwrap() {
                break;
            }
        }
        // Stepping past the end is an invalid PC.
        let err = thread.step().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidProgramCounter);
    }

    #[test]
    fn test_state_snapshot_resume() {
        let unlocking = Script::from_bytes(&[OP_2, OP_3]);
        let locking = Script::from_bytes(&[OP_ADD, OP_5, OP_EQUAL]);

        let mut first = Thread::new(
            ExecutionOptions::new().with_scripts(&locking, &unlocking),
        )
        .unwrap();
        first.step().unwrap();
        first.step().unwrap();
        let snapshot = first.state();
        assert_eq!(snapshot.data_stack, vec![vec![2u8], vec![3u8]]);

        // Resume a fresh thread from the snapshot and finish.
        let mut resumed = Thread::new(
            ExecutionOptions::new()
                .with_scripts(&locking, &unlocking)
                .with_state(snapshot),
        )
        .unwrap();
        assert!(resumed.execute().is_ok());
    }

    /// Records the data stack seen at every before_step call.
    struct HistoryDebugger {
        history: RefCell<Vec<Vec<Vec<u8>>>>,
        successes: RefCell<usize>,
    }

    impl Debugger for HistoryDebugger {
        fn before_step(&self, state: &State) {
            self.history.borrow_mut().push(state.data_stack.clone());
        }
        fn on_success(&self, _state: &State) {
            *self.successes.borrow_mut() += 1;
        }
    }

    #[test]
    fn test_debugger_step_history() {
        let unlocking = Script::from_hex("5456").unwrap();
        let locking = Script::from_hex("5253958852529387").unwrap();
        let dbg = Rc::new(HistoryDebugger {
            history: RefCell::new(Vec::new()),
            successes: RefCell::new(0),
        });

        Engine::new()
            .execute(
                ExecutionOptions::new()
                    .with_scripts(&locking, &unlocking)
                    .after_genesis()
                    .with_debugger(Rc::clone(&dbg) as Rc<dyn Debugger>),
            )
            .unwrap();

        let expected: Vec<Vec<Vec<u8>>> = vec![
            vec![],
            vec![vec![0x04]],
            vec![vec![0x04], vec![0x06]],
            vec![vec![0x04], vec![0x06], vec![0x02]],
            vec![vec![0x04], vec![0x06], vec![0x02], vec![0x03]],
            vec![vec![0x04], vec![0x06], vec![0x06]],
            vec![vec![0x04]],
            vec![vec![0x04], vec![0x02]],
            vec![vec![0x04], vec![0x02], vec![0x02]],
            vec![vec![0x04], vec![0x04]],
        ];
        assert_eq!(*dbg.history.borrow(), expected);
        assert_eq!(*dbg.successes.borrow(), 1);
    }

    /// Counts stack pushes and pops flowing through the hooks.
    struct TrafficDebugger {
        pushes: RefCell<usize>,
        pops: RefCell<usize>,
    }

    impl Debugger for TrafficDebugger {
        fn after_stack_push(&self, _data: &[u8]) {
            *self.pushes.borrow_mut() += 1;
        }
        fn after_stack_pop(&self, _data: &[u8]) {
            *self.pops.borrow_mut() += 1;
        }
    }

    #[test]
    fn test_debugger_stack_traffic() {
        let unlocking = Script::from_bytes(&[OP_1]);
        let locking = Script::from_bytes(&[OP_1, OP_EQUAL]);
        let dbg = Rc::new(TrafficDebugger {
            pushes: RefCell::new(0),
            pops: RefCell::new(0),
        });

        Engine::new()
            .execute(
                ExecutionOptions::new()
                    .with_scripts(&locking, &unlocking)
                    .with_debugger(Rc::clone(&dbg) as Rc<dyn Debugger>),
            )
            .unwrap();

        // OP_1, OP_1 push; OP_EQUAL pops both and pushes the result;
        // the final check pops it again.
        assert_eq!(*dbg.pushes.borrow(), 3);
        assert_eq!(*dbg.pops.borrow(), 3);
    }

    #[test]
    fn test_branch_skip_leaves_stacks_untouched() {
        // A dead branch full of stack-touching opcodes is a no-op.
        assert!(exec(
            &[OP_1, OP_0],
            &[
                OP_IF, OP_DUP, OP_DROP, OP_HASH256, OP_SWAP, OP_ENDIF, OP_1, OP_EQUAL
            ],
            ScriptFlags::NONE
        )
        .is_ok());
    }

    #[test]
    fn test_codeseparator_executes() {
        assert!(exec(
            &[OP_1],
            &[OP_CODESEPARATOR, OP_1, OP_EQUAL],
            ScriptFlags::NONE
        )
        .is_ok());
    }
}
