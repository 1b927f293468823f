//! The execution thread: program counter, conditional state, dispatch.

use std::rc::Rc;

use bsvm_script::opcodes::*;
use bsvm_script::Script;
use bsvm_transaction::{Transaction, TransactionOutput};

use crate::config::Config;
use crate::debug::{Debugger, NopDebugger, State};
use crate::error::{Error, ErrorCode};
use crate::flags::ScriptFlags;
use crate::ops_crypto::HashOp;
use crate::options::ExecutionOptions;
use crate::parsed_opcode::*;
use crate::scriptnum::ScriptNumber;
use crate::stack::{BoolStack, Stack};

/// Conditional stack entries.
pub(crate) const OP_COND_FALSE: i32 = 0;
pub(crate) const OP_COND_TRUE: i32 = 1;
pub(crate) const OP_COND_SKIP: i32 = 2;

/// A single script execution in progress.
///
/// Created per `Engine::execute` call and discarded at termination;
/// nothing is shared between executions.
pub struct Thread<'a> {
    /// The main data stack.
    pub dstack: Stack,
    /// The alternate stack (OP_TOALTSTACK / OP_FROMALTSTACK).
    pub astack: Stack,
    /// Tracks whether each open conditional block has seen an OP_ELSE.
    pub else_stack: BoolStack,
    /// Limit configuration for this execution.
    pub cfg: Config,
    /// The parsed scripts: unlocking, locking, and under BIP16 a third
    /// redeem script appended during execution.
    pub scripts: Vec<ParsedScript>,
    /// Conditional execution stack.
    pub cond_stack: Vec<i32>,
    /// Data stack snapshot taken when the unlocking script finishes.
    pub saved_first_stack: Vec<Vec<u8>>,
    /// Index of the currently executing script.
    pub script_idx: usize,
    /// Offset of the next opcode in the current script.
    pub script_off: usize,
    /// Offset just past the most recent OP_CODESEPARATOR.
    pub last_code_sep: usize,
    /// Non-push opcodes executed in the current script.
    pub num_ops: usize,
    /// Active verification flags.
    pub flags: ScriptFlags,
    /// Whether this execution is a P2SH spend.
    pub bip16: bool,
    /// Whether post-Genesis rules apply.
    pub after_genesis: bool,
    /// Whether a post-Genesis OP_RETURN was hit under a conditional.
    pub early_return_after_genesis: bool,
    /// Execution observer shared with both stacks.
    pub(crate) debug: Rc<dyn Debugger>,
    /// Bound transaction, when executing a real spend.
    pub(crate) tx: Option<&'a Transaction>,
    /// The output being spent.
    pub(crate) prev_output: Option<&'a TransactionOutput>,
    /// The input index being verified.
    pub input_idx: usize,
}

impl<'a> Thread<'a> {
    /// Build a thread from validated options.
    ///
    /// Resolves scripts, applies flag implications, enforces the
    /// pre-execution checks (sizes, flag combinations, push-only
    /// rules), and parses both scripts.
    pub fn new(opts: ExecutionOptions<'a>) -> Result<Self, Error> {
        opts.validate()?;

        let unlocking_script: &Script = match opts.unlocking_script {
            Some(s) => s,
            None => opts
                .tx
                .and_then(|tx| tx.inputs[opts.input_idx].unlocking_script.as_ref())
                .expect("validated"),
        };
        let locking_script: &Script = match opts.locking_script {
            Some(s) => s,
            None => &opts.previous_tx_out.expect("validated").locking_script,
        };

        let mut flags = opts.flags;

        // Fork-id signatures only make sense with strict encodings.
        if flags.has_flag(ScriptFlags::ENABLE_SIGHASH_FORKID) {
            flags.add_flag(ScriptFlags::VERIFY_STRICT_ENCODING);
        }

        // Clean-stack verification without P2SH would turn BIP16 into a
        // hard fork, so the combination is rejected outright.
        if flags.has_flag(ScriptFlags::VERIFY_CLEAN_STACK) && !flags.has_flag(ScriptFlags::BIP16) {
            return Err(Error::new(
                ErrorCode::InvalidFlags,
                "invalid scriptflag combination".to_string(),
            ));
        }

        let after_genesis = flags.has_flag(ScriptFlags::UTXO_AFTER_GENESIS);
        let cfg = if after_genesis {
            Config::after_genesis()
        } else {
            Config::before_genesis()
        };

        if unlocking_script.is_empty() && locking_script.is_empty() {
            return Err(Error::new(
                ErrorCode::EvalFalse,
                "false stack entry at end of script execution".to_string(),
            ));
        }

        if unlocking_script.len() > cfg.max_script_size() {
            return Err(Error::new(
                ErrorCode::ScriptTooBig,
                format!(
                    "unlocking script size {} is larger than the max allowed size {}",
                    unlocking_script.len(),
                    cfg.max_script_size()
                ),
            ));
        }
        if locking_script.len() > cfg.max_script_size() {
            return Err(Error::new(
                ErrorCode::ScriptTooBig,
                format!(
                    "locking script size {} is larger than the max allowed size {}",
                    locking_script.len(),
                    cfg.max_script_size()
                ),
            ));
        }

        let error_on_checksig = opts.tx.is_none() || opts.previous_tx_out.is_none();
        let uscript = parse_script(unlocking_script, error_on_checksig)?;
        let lscript = parse_script(locking_script, error_on_checksig)?;

        if flags.has_flag(ScriptFlags::VERIFY_SIG_PUSH_ONLY) && !is_push_only(&uscript) {
            return Err(Error::new(
                ErrorCode::NotPushOnly,
                "signature script is not push only".to_string(),
            ));
        }

        let bip16 = flags.has_flag(ScriptFlags::BIP16) && locking_script.is_p2sh();
        if bip16 && !is_push_only(&uscript) {
            return Err(Error::new(
                ErrorCode::NotPushOnly,
                "pay to script hash is not push only".to_string(),
            ));
        }

        // Nothing to execute in an empty unlocking script.
        let script_idx = if unlocking_script.is_empty() { 1 } else { 0 };

        let debug: Rc<dyn Debugger> = opts.debugger.unwrap_or_else(|| Rc::new(NopDebugger));
        let verify_minimal_data = flags.has_flag(ScriptFlags::VERIFY_MINIMAL_DATA);
        let max_num_len = cfg.max_script_number_length();

        let mut thread = Thread {
            dstack: Stack::new(
                max_num_len,
                after_genesis,
                verify_minimal_data,
                Rc::clone(&debug),
            ),
            astack: Stack::new(
                max_num_len,
                after_genesis,
                verify_minimal_data,
                Rc::clone(&debug),
            ),
            else_stack: BoolStack::new(),
            cfg,
            scripts: vec![uscript, lscript],
            cond_stack: Vec::new(),
            saved_first_stack: Vec::new(),
            script_idx,
            script_off: 0,
            last_code_sep: 0,
            num_ops: 0,
            flags,
            bip16,
            after_genesis,
            early_return_after_genesis: false,
            debug,
            tx: opts.tx,
            prev_output: opts.previous_tx_out,
            input_idx: opts.input_idx,
        };

        if let Some(state) = opts.state {
            thread.set_state(state);
        }

        Ok(thread)
    }

    /// Check whether a verification flag is set.
    pub fn has_flag(&self, flag: ScriptFlags) -> bool {
        self.flags.has_flag(flag)
    }

    /// Check whether any of the given flags are set.
    pub fn has_any(&self, flags: &[ScriptFlags]) -> bool {
        self.flags.has_any(flags)
    }

    /// Whether the current conditional branch is executing: the
    /// conditional stack is empty or its top entry is true.
    pub fn is_branch_executing(&self) -> bool {
        self.cond_stack.is_empty() || *self.cond_stack.last().expect("non-empty") == OP_COND_TRUE
    }

    /// Whether `pop` should execute given post-Genesis early-return
    /// state. Before Genesis everything executes; after Genesis an
    /// opcode runs only while no enclosing branch is false and no
    /// OP_RETURN has fired (OP_RETURN itself stays live to allow the
    /// empty-condition success case).
    pub fn should_exec(&self, pop: &ParsedOpcode) -> bool {
        if !self.after_genesis {
            return true;
        }
        let all_live = self.cond_stack.iter().all(|&v| v != OP_COND_FALSE);
        all_live && (!self.early_return_after_genesis || pop.opcode == OP_RETURN)
    }

    /// Capture the thread's mutable state.
    pub fn state(&self) -> State {
        State {
            data_stack: self.dstack.get_stack(),
            alt_stack: self.astack.get_stack(),
            else_stack: self.else_stack.get_stack(),
            cond_stack: self.cond_stack.clone(),
            saved_first_stack: self.saved_first_stack.clone(),
            script_idx: self.script_idx,
            script_off: self.script_off,
            last_code_sep: self.last_code_sep,
            num_ops: self.num_ops,
            early_return_after_genesis: self.early_return_after_genesis,
        }
    }

    /// Restore a previously captured state.
    pub fn set_state(&mut self, state: State) {
        self.dstack.set_stack(state.data_stack);
        self.astack.set_stack(state.alt_stack);
        self.else_stack.set_stack(state.else_stack);
        self.cond_stack = state.cond_stack;
        self.saved_first_stack = state.saved_first_stack;
        self.script_idx = state.script_idx;
        self.script_off = state.script_off;
        self.last_code_sep = state.last_code_sep;
        self.num_ops = state.num_ops;
        self.early_return_after_genesis = state.early_return_after_genesis;
    }

    /// Run every script to completion and apply the final check.
    pub fn execute(&mut self) -> Result<(), Error> {
        let dbg = Rc::clone(&self.debug);
        dbg.before_execute(&self.state());
        let result = loop {
            dbg.before_step(&self.state());
            match self.step() {
                Err(e) => break Err(e),
                Ok(done) => {
                    dbg.after_step(&self.state());
                    if done {
                        break Ok(());
                    }
                }
            }
        };
        dbg.after_execute(&self.state());
        result?;
        self.check_error_condition(true)
    }

    /// Execute one opcode. Returns true when every script has finished.
    pub fn step(&mut self) -> Result<bool, Error> {
        if self.script_idx >= self.scripts.len() {
            return Err(Error::new(
                ErrorCode::InvalidProgramCounter,
                format!(
                    "past input scripts {}:{} {}:xxxx",
                    self.script_idx,
                    self.script_off,
                    self.scripts.len()
                ),
            ));
        }
        if self.script_off >= self.scripts[self.script_idx].len() {
            return Err(Error::new(
                ErrorCode::InvalidProgramCounter,
                format!(
                    "past input scripts {}:{} {}:{:04}",
                    self.script_idx,
                    self.script_off,
                    self.script_idx,
                    self.scripts[self.script_idx].len()
                ),
            ));
        }

        let opcode = self.scripts[self.script_idx][self.script_off].clone();
        self.script_off += 1;

        if let Err(e) = self.execute_opcode(&opcode) {
            if e.code == ErrorCode::Ok {
                // Early success: post-Genesis OP_RETURN outside any
                // conditional skips the rest of the current script.
                self.shift_script();
                return Ok(self.script_idx >= self.scripts.len());
            }
            return Err(e);
        }

        let combined = self.dstack.depth() + self.astack.depth();
        if combined > self.cfg.max_stack_size() as i32 {
            return Err(Error::new(
                ErrorCode::StackOverflow,
                format!(
                    "combined stack size {} > max allowed {}",
                    combined,
                    self.cfg.max_stack_size()
                ),
            ));
        }

        if self.script_off < self.scripts[self.script_idx].len() {
            return Ok(false);
        }

        // End of the current script.
        if !self.cond_stack.is_empty() {
            return Err(Error::new(
                ErrorCode::UnbalancedConditional,
                "end of script reached in conditional execution".to_string(),
            ));
        }

        // The alt stack does not survive between scripts.
        self.astack.clear();

        self.shift_script();

        // BIP16 handling: snapshot the stack after the unlocking
        // script, and once the locking script verified the hash, swap
        // the snapshot back and queue the redeem script.
        if self.bip16 && !self.after_genesis && self.script_idx <= 2 {
            match self.script_idx {
                1 => {
                    self.saved_first_stack = self.dstack.get_stack();
                }
                2 => {
                    self.check_error_condition(false)?;
                    let redeem_bytes = self.saved_first_stack.last().cloned().unwrap_or_default();
                    let redeem = Script::from_bytes(&redeem_bytes);
                    let pops = parse_script(&redeem, false)?;
                    self.scripts.push(pops);
                    let len = self.saved_first_stack.len();
                    let restored = self.saved_first_stack[..len.saturating_sub(1)].to_vec();
                    self.dstack.set_stack(restored);
                }
                _ => {}
            }
        }

        // Skip zero-length scripts.
        if self.script_idx < self.scripts.len()
            && self.script_off >= self.scripts[self.script_idx].len()
        {
            self.script_idx += 1;
        }

        self.last_code_sep = 0;
        if self.script_idx >= self.scripts.len() {
            return Ok(true);
        }

        Ok(false)
    }

    /// Advance to the next script, resetting per-script counters.
    fn shift_script(&mut self) {
        self.num_ops = 0;
        self.script_off = 0;
        self.script_idx += 1;
        self.early_return_after_genesis = false;
    }

    /// Verify the terminal stack state.
    ///
    /// Requires a non-empty stack whose top is truthy; with the
    /// clean-stack flag and `final_script`, exactly one element must
    /// remain.
    pub fn check_error_condition(&mut self, final_script: bool) -> Result<(), Error> {
        if self.dstack.depth() < 1 {
            return Err(Error::new(
                ErrorCode::EmptyStack,
                "stack empty at end of script execution".to_string(),
            ));
        }

        if final_script
            && self.has_flag(ScriptFlags::VERIFY_CLEAN_STACK)
            && self.dstack.depth() != 1
        {
            return Err(Error::new(
                ErrorCode::CleanStack,
                format!("stack contains {} unexpected items", self.dstack.depth() - 1),
            ));
        }

        let v = self.dstack.pop_bool()?;
        if !v {
            return Err(Error::new(
                ErrorCode::EvalFalse,
                "false stack entry at end of script execution".to_string(),
            ));
        }

        if final_script {
            let dbg = Rc::clone(&self.debug);
            dbg.on_success(&self.state());
        }

        Ok(())
    }

    /// Apply the pre-dispatch rules, then execute `pop` if the current
    /// branch calls for it.
    fn execute_opcode(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        if pop.malformed {
            return Err(Error::new(
                ErrorCode::MalformedPush,
                "attempt to execute truncated push".to_string(),
            ));
        }

        if pop.data.len() > self.cfg.max_script_element_size() {
            return Err(Error::new(
                ErrorCode::ElementTooBig,
                format!(
                    "element size {} exceeds max allowed size {}",
                    pop.data.len(),
                    self.cfg.max_script_element_size()
                ),
            ));
        }

        let exec = self.should_exec(pop);

        // Disabled opcodes poison the script even inside unexecuted
        // branches before Genesis.
        if pop.is_disabled() && (!self.after_genesis || exec) {
            return Err(Error::new(
                ErrorCode::DisabledOpcode,
                format!("attempt to execute disabled opcode {}", pop.name()),
            ));
        }

        if pop.always_illegal() && !self.after_genesis {
            return Err(Error::new(
                ErrorCode::ReservedOpcode,
                format!("attempt to execute reserved opcode {}", pop.name()),
            ));
        }

        // Everything above OP_16 counts toward the operation limit,
        // executed or not.
        if pop.opcode > OP_16 {
            self.num_ops += 1;
            if self.num_ops > self.cfg.max_ops() {
                return Err(Error::new(
                    ErrorCode::TooManyOperations,
                    format!("exceeded max operation limit of {}", self.cfg.max_ops()),
                ));
            }
        }

        if !self.is_branch_executing() && !pop.is_conditional() {
            return Ok(());
        }

        if self.dstack.verify_minimal_data
            && self.is_branch_executing()
            && pop.opcode <= OP_PUSHDATA4
            && exec
        {
            pop.enforce_minimum_data_push()?;
        }

        // Past a post-Genesis OP_RETURN only conditionals still run,
        // keeping if/else balance checkable.
        if !exec && !pop.is_conditional() {
            return Ok(());
        }

        self.dispatch_opcode(pop)
    }

    fn dispatch_opcode(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        match pop.opcode {
            OP_0 => {
                self.dstack.push_byte_array(vec![]);
                Ok(())
            }
            op if (OP_DATA_1..=OP_DATA_75).contains(&op) => {
                self.dstack.push_byte_array(pop.data.clone());
                Ok(())
            }
            OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {
                self.dstack.push_byte_array(pop.data.clone());
                Ok(())
            }
            OP_1NEGATE => {
                self.dstack
                    .push_int(&ScriptNumber::new(-1, self.after_genesis));
                Ok(())
            }
            OP_RESERVED => self.op_reserved(pop),
            op if (OP_1..=OP_16).contains(&op) => {
                self.dstack.push_byte_array(vec![op - (OP_1 - 1)]);
                Ok(())
            }
            OP_NOP => Ok(()),
            OP_VER => self.op_reserved(pop),
            OP_IF => self.op_if(pop),
            OP_NOTIF => self.op_notif(pop),
            OP_VERIF | OP_VERNOTIF => self.op_ver_conditional(pop),
            OP_ELSE => self.op_else(pop),
            OP_ENDIF => self.op_endif(pop),
            OP_VERIFY => self.op_verify(pop),
            OP_RETURN => self.op_return(),

            OP_CHECKLOCKTIMEVERIFY => self.op_check_locktime_verify(),
            OP_CHECKSEQUENCEVERIFY => self.op_check_sequence_verify(),

            OP_TOALTSTACK => self.op_to_alt_stack(),
            OP_FROMALTSTACK => self.op_from_alt_stack(),
            OP_2DROP => self.dstack.drop_n(2),
            OP_2DUP => self.dstack.dup_n(2),
            OP_3DUP => self.dstack.dup_n(3),
            OP_2OVER => self.dstack.over_n(2),
            OP_2ROT => self.dstack.rot_n(2),
            OP_2SWAP => self.dstack.swap_n(2),
            OP_IFDUP => self.op_ifdup(),
            OP_DEPTH => {
                let d = self.dstack.depth();
                self.dstack
                    .push_int(&ScriptNumber::new(d as i64, self.after_genesis));
                Ok(())
            }
            OP_DROP => self.dstack.drop_n(1),
            OP_DUP => self.dstack.dup_n(1),
            OP_NIP => self.dstack.nip_n_discard(1),
            OP_OVER => self.dstack.over_n(1),
            OP_PICK => self.op_pick(),
            OP_ROLL => self.op_roll(),
            OP_ROT => self.dstack.rot_n(1),
            OP_SWAP => self.dstack.swap_n(1),
            OP_TUCK => self.dstack.tuck(),

            OP_CAT => self.op_cat(),
            OP_SPLIT => self.op_split(),
            OP_NUM2BIN => self.op_num2bin(),
            OP_BIN2NUM => self.op_bin2num(),
            OP_SIZE => self.op_size(),

            OP_INVERT => self.op_invert(),
            OP_AND => self.op_bitwise(|a, b| a & b),
            OP_OR => self.op_bitwise(|a, b| a | b),
            OP_XOR => self.op_bitwise(|a, b| a ^ b),
            OP_EQUAL => self.op_equal(),
            OP_EQUALVERIFY => self.op_equalverify(pop),
            OP_RESERVED1 | OP_RESERVED2 => self.op_reserved(pop),

            OP_1ADD => self.op_unary_int(|m| {
                m.incr();
            }),
            OP_1SUB => self.op_unary_int(|m| {
                m.decr();
            }),
            OP_2MUL | OP_2DIV => Err(Error::new(
                ErrorCode::DisabledOpcode,
                format!("attempt to execute disabled opcode {}", pop.name()),
            )),
            OP_NEGATE => self.op_unary_int(|m| {
                m.neg();
            }),
            OP_ABS => self.op_unary_int(|m| {
                m.abs();
            }),
            OP_NOT => self.op_not(),
            OP_0NOTEQUAL => self.op_0notequal(),
            OP_ADD => self.op_add(),
            OP_SUB => self.op_sub(),
            OP_MUL => self.op_mul(),
            OP_DIV => self.op_div(),
            OP_MOD => self.op_mod(),
            OP_LSHIFT => self.op_lshift(),
            OP_RSHIFT => self.op_rshift(),
            OP_BOOLAND => self.op_bool_binop(|a, b| !a.is_zero() && !b.is_zero()),
            OP_BOOLOR => self.op_bool_binop(|a, b| !a.is_zero() || !b.is_zero()),
            OP_NUMEQUAL => self.op_bool_binop(|a, b| a.equal(b)),
            OP_NUMEQUALVERIFY => self.op_numequalverify(pop),
            OP_NUMNOTEQUAL => self.op_bool_binop(|a, b| !a.equal(b)),
            OP_LESSTHAN => self.op_bool_binop(|a, b| a.less_than(b)),
            OP_GREATERTHAN => self.op_bool_binop(|a, b| a.greater_than(b)),
            OP_LESSTHANOREQUAL => self.op_bool_binop(|a, b| a.less_than_or_equal(b)),
            OP_GREATERTHANOREQUAL => self.op_bool_binop(|a, b| a.greater_than_or_equal(b)),
            OP_MIN => self.op_min(),
            OP_MAX => self.op_max(),
            OP_WITHIN => self.op_within(),

            OP_RIPEMD160 => self.op_hash(HashOp::Ripemd160),
            OP_SHA1 => self.op_hash(HashOp::Sha1),
            OP_SHA256 => self.op_hash(HashOp::Sha256),
            OP_HASH160 => self.op_hash(HashOp::Hash160),
            OP_HASH256 => self.op_hash(HashOp::Hash256),
            OP_CODESEPARATOR => {
                self.last_code_sep = self.script_off;
                Ok(())
            }
            OP_CHECKSIG => self.op_checksig(),
            OP_CHECKSIGVERIFY => self.op_checksigverify(pop),
            OP_CHECKMULTISIG => self.op_checkmultisig(),
            OP_CHECKMULTISIGVERIFY => self.op_checkmultisigverify(pop),

            OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9 | OP_NOP10 => {
                if self.has_flag(ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                    return Err(Error::new(
                        ErrorCode::DiscourageUpgradableNOPs,
                        format!(
                            "OP_NOP{} reserved for soft-fork upgrades",
                            pop.opcode - (OP_NOP1 - 1)
                        ),
                    ));
                }
                Ok(())
            }

            // Unassigned bytes and the internal-use constants.
            _ => Err(Error::new(
                ErrorCode::ReservedOpcode,
                format!("attempt to execute invalid opcode {}", pop.name()),
            )),
        }
    }
}
