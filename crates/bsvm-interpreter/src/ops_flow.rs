//! Flow control and locktime executors.

use crate::error::{Error, ErrorCode};
use crate::flags::ScriptFlags;
use crate::parsed_opcode::ParsedOpcode;
use crate::scriptnum::ScriptNumber;
use crate::stack::as_bool;
use crate::thread::{Thread, OP_COND_FALSE, OP_COND_SKIP, OP_COND_TRUE};

/// Locktime values at or above this are Unix timestamps, below are
/// block heights.
const LOCK_TIME_THRESHOLD: i64 = 500_000_000;

/// Sequence number of a finalized input.
const MAX_TX_IN_SEQUENCE_NUM: u32 = 0xffff_ffff;
/// Bit disabling relative lock-time for a sequence number.
const SEQUENCE_LOCK_TIME_DISABLED: u32 = 1 << 31;
/// Bit marking a relative lock-time as seconds rather than blocks.
const SEQUENCE_LOCK_TIME_IS_SECONDS: i64 = 1 << 22;
/// Mask of the sequence bits that carry the relative lock-time value.
const SEQUENCE_LOCK_TIME_MASK: i64 = 0x0000_ffff;

impl<'a> Thread<'a> {
    pub(crate) fn op_reserved(&self, pop: &ParsedOpcode) -> Result<(), Error> {
        Err(Error::new(
            ErrorCode::ReservedOpcode,
            format!("attempt to execute reserved opcode {}", pop.name()),
        ))
    }

    /// OP_VERIF / OP_VERNOTIF: post-Genesis they are tolerated inside
    /// non-executing branches, otherwise reserved.
    pub(crate) fn op_ver_conditional(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        if self.after_genesis && !self.should_exec(pop) {
            return Ok(());
        }
        self.op_reserved(pop)
    }

    /// Pop the OP_IF/OP_NOTIF argument. With the minimal-if flag the
    /// item must be empty or exactly 0x01.
    pub(crate) fn pop_if_bool(&mut self) -> Result<bool, Error> {
        if self.has_flag(ScriptFlags::VERIFY_MINIMAL_IF) {
            let b = self.dstack.pop_byte_array()?;
            if b.len() > 1 {
                return Err(Error::new(
                    ErrorCode::MinimalIf,
                    format!("conditional has data of length {}", b.len()),
                ));
            }
            if b.len() == 1 && b[0] != 1 {
                return Err(Error::new(
                    ErrorCode::MinimalIf,
                    "conditional failed".to_string(),
                ));
            }
            return Ok(as_bool(&b));
        }
        self.dstack.pop_bool()
    }

    pub(crate) fn op_if(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        let mut cond_val = OP_COND_FALSE;
        if self.should_exec(pop) {
            if self.is_branch_executing() {
                if self.pop_if_bool()? {
                    cond_val = OP_COND_TRUE;
                }
            } else {
                cond_val = OP_COND_SKIP;
            }
        }
        self.cond_stack.push(cond_val);
        self.else_stack.push_bool(false);
        Ok(())
    }

    pub(crate) fn op_notif(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        let mut cond_val = OP_COND_FALSE;
        if self.should_exec(pop) {
            if self.is_branch_executing() {
                if !self.pop_if_bool()? {
                    cond_val = OP_COND_TRUE;
                }
            } else {
                cond_val = OP_COND_SKIP;
            }
        }
        self.cond_stack.push(cond_val);
        self.else_stack.push_bool(false);
        Ok(())
    }

    /// OP_ELSE flips the current branch. A skip entry stays a skip; a
    /// second OP_ELSE in the same block is unbalanced.
    pub(crate) fn op_else(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        if self.cond_stack.is_empty() {
            return Err(Error::new(
                ErrorCode::UnbalancedConditional,
                format!(
                    "encountered opcode {} with no matching opcode to begin conditional execution",
                    pop.name()
                ),
            ));
        }

        let seen_else = self.else_stack.pop_bool()?;
        if seen_else {
            return Err(Error::new(
                ErrorCode::UnbalancedConditional,
                format!(
                    "encountered opcode {} with no matching opcode to begin conditional execution",
                    pop.name()
                ),
            ));
        }

        let idx = self.cond_stack.len() - 1;
        match self.cond_stack[idx] {
            OP_COND_TRUE => self.cond_stack[idx] = OP_COND_FALSE,
            OP_COND_FALSE => self.cond_stack[idx] = OP_COND_TRUE,
            _ => {}
        }

        self.else_stack.push_bool(true);
        Ok(())
    }

    pub(crate) fn op_endif(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        if self.cond_stack.is_empty() {
            return Err(Error::new(
                ErrorCode::UnbalancedConditional,
                format!(
                    "encountered opcode {} with no matching opcode to begin conditional execution",
                    pop.name()
                ),
            ));
        }
        self.cond_stack.pop();
        self.else_stack.pop_bool()?;
        Ok(())
    }

    pub(crate) fn op_verify(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        self.abstract_verify(pop, ErrorCode::Verify)
    }

    /// Pop a boolean and fail with `code` when it is false. Shared by
    /// the whole VERIFY family.
    pub(crate) fn abstract_verify(
        &mut self,
        pop: &ParsedOpcode,
        code: ErrorCode,
    ) -> Result<(), Error> {
        let verified = self.dstack.pop_bool()?;
        if !verified {
            return Err(Error::new(code, format!("{} failed", pop.name())));
        }
        Ok(())
    }

    /// OP_RETURN. Before Genesis: unconditional failure. After
    /// Genesis: immediate success when no conditional is open
    /// (signalled with the `Ok` sentinel), otherwise mark early return
    /// and keep checking conditional balance.
    pub(crate) fn op_return(&mut self) -> Result<(), Error> {
        if !self.after_genesis {
            return Err(Error::new(
                ErrorCode::EarlyReturn,
                "script returned early".to_string(),
            ));
        }
        self.early_return_after_genesis = true;
        if self.cond_stack.is_empty() {
            return Err(Error::new(ErrorCode::Ok, "success".to_string()));
        }
        Ok(())
    }

    /// OP_CHECKLOCKTIMEVERIFY (BIP65). A NOP when the flag is off or
    /// after Genesis.
    pub(crate) fn op_check_locktime_verify(&mut self) -> Result<(), Error> {
        if !self.has_flag(ScriptFlags::VERIFY_CHECKLOCKTIMEVERIFY) || self.after_genesis {
            if self.has_flag(ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                return Err(Error::new(
                    ErrorCode::DiscourageUpgradableNOPs,
                    "OP_NOP2 reserved for soft-fork upgrades".to_string(),
                ));
            }
            return Ok(());
        }

        let tx = self.tx.ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidParams,
                "no transaction for CHECKLOCKTIMEVERIFY".to_string(),
            )
        })?;

        let so = self.dstack.peek_byte_array(0)?;
        let lock_time =
            ScriptNumber::from_bytes(&so, 5, self.dstack.verify_minimal_data, self.after_genesis)?;

        if lock_time.less_than_int(0) {
            return Err(Error::new(
                ErrorCode::NegativeLockTime,
                format!("negative lock time: {}", lock_time.to_i64()),
            ));
        }

        verify_lock_time(tx.lock_time as i64, LOCK_TIME_THRESHOLD, lock_time.to_i64())?;

        if tx.inputs[self.input_idx].sequence_number == MAX_TX_IN_SEQUENCE_NUM {
            return Err(Error::new(
                ErrorCode::UnsatisfiedLockTime,
                "transaction input is finalized".to_string(),
            ));
        }

        Ok(())
    }

    /// OP_CHECKSEQUENCEVERIFY (BIP112). A NOP when the flag is off or
    /// after Genesis.
    pub(crate) fn op_check_sequence_verify(&mut self) -> Result<(), Error> {
        if !self.has_flag(ScriptFlags::VERIFY_CHECKSEQUENCEVERIFY) || self.after_genesis {
            if self.has_flag(ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                return Err(Error::new(
                    ErrorCode::DiscourageUpgradableNOPs,
                    "OP_NOP3 reserved for soft-fork upgrades".to_string(),
                ));
            }
            return Ok(());
        }

        let tx = self.tx.ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidParams,
                "no transaction for CHECKSEQUENCEVERIFY".to_string(),
            )
        })?;

        let so = self.dstack.peek_byte_array(0)?;
        let stack_seq =
            ScriptNumber::from_bytes(&so, 5, self.dstack.verify_minimal_data, self.after_genesis)?;

        if stack_seq.less_than_int(0) {
            return Err(Error::new(
                ErrorCode::NegativeLockTime,
                format!("negative sequence: {}", stack_seq.to_i64()),
            ));
        }

        let sequence = stack_seq.to_i64();

        // A set disabled bit in the stack operand turns CSV into a NOP.
        if sequence & (SEQUENCE_LOCK_TIME_DISABLED as i64) != 0 {
            return Ok(());
        }

        if tx.version < 2 {
            return Err(Error::new(
                ErrorCode::UnsatisfiedLockTime,
                format!("invalid transaction version: {}", tx.version),
            ));
        }

        let tx_sequence = tx.inputs[self.input_idx].sequence_number as i64;
        if tx_sequence & (SEQUENCE_LOCK_TIME_DISABLED as i64) != 0 {
            return Err(Error::new(
                ErrorCode::UnsatisfiedLockTime,
                format!(
                    "transaction sequence has sequence locktime disabled bit set: 0x{:x}",
                    tx_sequence
                ),
            ));
        }

        let lock_time_mask = SEQUENCE_LOCK_TIME_IS_SECONDS | SEQUENCE_LOCK_TIME_MASK;
        verify_lock_time(
            tx_sequence & lock_time_mask,
            SEQUENCE_LOCK_TIME_IS_SECONDS,
            sequence & lock_time_mask,
        )
    }
}

/// Shared lock-time comparison: both values must sit on the same side
/// of `threshold` and the stack value must not exceed the transaction
/// value.
pub(crate) fn verify_lock_time(tx_lock_time: i64, threshold: i64, lock_time: i64) -> Result<(), Error> {
    if (tx_lock_time < threshold && lock_time >= threshold)
        || (tx_lock_time >= threshold && lock_time < threshold)
    {
        return Err(Error::new(
            ErrorCode::UnsatisfiedLockTime,
            format!(
                "mismatched locktime types -- tx locktime {}, stack locktime {}",
                tx_lock_time, lock_time
            ),
        ));
    }
    if lock_time > tx_lock_time {
        return Err(Error::new(
            ErrorCode::UnsatisfiedLockTime,
            format!(
                "locktime requirement not satisfied -- locktime is greater than the transaction locktime: {} > {}",
                lock_time, tx_lock_time
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_lock_time() {
        // Same type, satisfied.
        assert!(verify_lock_time(100, LOCK_TIME_THRESHOLD, 50).is_ok());
        assert!(verify_lock_time(100, LOCK_TIME_THRESHOLD, 100).is_ok());
        // Stack value exceeds tx value.
        assert!(verify_lock_time(100, LOCK_TIME_THRESHOLD, 101).is_err());
        // Height vs timestamp mismatch.
        assert!(verify_lock_time(100, LOCK_TIME_THRESHOLD, 600_000_000).is_err());
        assert!(verify_lock_time(600_000_000, LOCK_TIME_THRESHOLD, 100).is_err());
        // Both timestamps.
        assert!(verify_lock_time(600_000_001, LOCK_TIME_THRESHOLD, 600_000_000).is_ok());
    }
}
