//! Script verification flags.

use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Bitset of script verification flags controlling engine behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScriptFlags(pub u32);

impl ScriptFlags {
    /// No flags set.
    pub const NONE: ScriptFlags = ScriptFlags(0);
    /// Evaluate P2SH (BIP16) subscripts.
    pub const BIP16: ScriptFlags = ScriptFlags(1 << 0);
    /// Require the multisig dummy element to be empty.
    pub const STRICT_MULTI_SIG: ScriptFlags = ScriptFlags(1 << 1);
    /// Reject the upgradable NOP opcodes (NOP1, NOP4..NOP10).
    pub const DISCOURAGE_UPGRADABLE_NOPS: ScriptFlags = ScriptFlags(1 << 2);
    /// Enforce OP_CHECKLOCKTIMEVERIFY (BIP65).
    pub const VERIFY_CHECKLOCKTIMEVERIFY: ScriptFlags = ScriptFlags(1 << 3);
    /// Enforce OP_CHECKSEQUENCEVERIFY (BIP112).
    pub const VERIFY_CHECKSEQUENCEVERIFY: ScriptFlags = ScriptFlags(1 << 4);
    /// Require exactly one stack element at the end of execution.
    pub const VERIFY_CLEAN_STACK: ScriptFlags = ScriptFlags(1 << 5);
    /// Require strict DER signature encoding.
    pub const VERIFY_DER_SIGNATURES: ScriptFlags = ScriptFlags(1 << 6);
    /// Require low-S signature values (BIP62).
    pub const VERIFY_LOW_S: ScriptFlags = ScriptFlags(1 << 7);
    /// Require minimal push and numeric encodings.
    pub const VERIFY_MINIMAL_DATA: ScriptFlags = ScriptFlags(1 << 8);
    /// Require failed CHECK(MULTI)SIG signatures to be empty.
    pub const VERIFY_NULL_FAIL: ScriptFlags = ScriptFlags(1 << 9);
    /// Require the unlocking script to be push-only.
    pub const VERIFY_SIG_PUSH_ONLY: ScriptFlags = ScriptFlags(1 << 10);
    /// Enable the fork-id sighash algorithm (UAHF replay protection).
    pub const ENABLE_SIGHASH_FORKID: ScriptFlags = ScriptFlags(1 << 11);
    /// Require canonical signature and public key encodings.
    pub const VERIFY_STRICT_ENCODING: ScriptFlags = ScriptFlags(1 << 12);
    /// Require the fork-id bit in every sighash type byte.
    pub const VERIFY_BIP143_SIGHASH: ScriptFlags = ScriptFlags(1 << 13);
    /// The spent UTXO was created after the Genesis upgrade.
    pub const UTXO_AFTER_GENESIS: ScriptFlags = ScriptFlags(1 << 14);
    /// Restrict OP_IF/OP_NOTIF arguments to empty or 0x01.
    pub const VERIFY_MINIMAL_IF: ScriptFlags = ScriptFlags(1 << 15);

    /// Return true if every bit of `flag` is set.
    pub fn has_flag(self, flag: ScriptFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Return true if any of the given flags are set.
    pub fn has_any(self, flags: &[ScriptFlags]) -> bool {
        flags.iter().any(|f| self.has_flag(*f))
    }

    /// Set the bits of `flag`.
    pub fn add_flag(&mut self, flag: ScriptFlags) {
        self.0 |= flag.0;
    }
}

impl BitOr for ScriptFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        ScriptFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ScriptFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ScriptFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        ScriptFlags(self.0 & rhs.0)
    }
}
