//! Execution options.
//!
//! `ExecutionOptions` aggregates everything one `Engine::execute` call
//! needs: scripts (given directly or taken from a bound transaction),
//! verification flags, and optional debugger and resume state. The
//! chainable `with_*`/flag methods mirror the option set of the
//! original engine.

use std::rc::Rc;

use bsvm_script::Script;
use bsvm_transaction::{Transaction, TransactionOutput};

use crate::debug::{Debugger, State};
use crate::error::{Error, ErrorCode};
use crate::flags::ScriptFlags;

/// Parameters for one execution.
///
/// Scripts can be supplied directly with [`with_scripts`], or through a
/// transaction plus the output it spends with [`with_tx`]. Signature
/// and locktime opcodes require the transaction form.
///
/// [`with_scripts`]: ExecutionOptions::with_scripts
/// [`with_tx`]: ExecutionOptions::with_tx
#[derive(Default)]
pub struct ExecutionOptions<'a> {
    pub(crate) locking_script: Option<&'a Script>,
    pub(crate) unlocking_script: Option<&'a Script>,
    pub(crate) tx: Option<&'a Transaction>,
    pub(crate) previous_tx_out: Option<&'a TransactionOutput>,
    pub(crate) input_idx: usize,
    pub(crate) flags: ScriptFlags,
    pub(crate) debugger: Option<Rc<dyn Debugger>>,
    pub(crate) state: Option<State>,
}

impl<'a> ExecutionOptions<'a> {
    /// Start with no scripts and no flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a transaction input and the output it spends.
    ///
    /// The unlocking script is taken from `tx.inputs[input_idx]` and
    /// the locking script from `prev_output` unless overridden by
    /// `with_scripts`.
    pub fn with_tx(
        mut self,
        tx: &'a Transaction,
        input_idx: usize,
        prev_output: &'a TransactionOutput,
    ) -> Self {
        self.tx = Some(tx);
        self.previous_tx_out = Some(prev_output);
        self.input_idx = input_idx;
        self
    }

    /// Supply raw scripts directly.
    pub fn with_scripts(mut self, locking_script: &'a Script, unlocking_script: &'a Script) -> Self {
        self.locking_script = Some(locking_script);
        self.unlocking_script = Some(unlocking_script);
        self
    }

    /// Treat the spent UTXO as created after the Genesis upgrade.
    pub fn after_genesis(mut self) -> Self {
        self.flags.add_flag(ScriptFlags::UTXO_AFTER_GENESIS);
        self
    }

    /// Enable the fork-id sighash algorithm. Implies strict encoding.
    pub fn fork_id(mut self) -> Self {
        self.flags.add_flag(ScriptFlags::ENABLE_SIGHASH_FORKID);
        self
    }

    /// Enable P2SH (BIP16) evaluation.
    pub fn p2sh(mut self) -> Self {
        self.flags.add_flag(ScriptFlags::BIP16);
        self
    }

    /// Add verification flags.
    pub fn with_flags(mut self, flags: ScriptFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Attach an execution observer.
    pub fn with_debugger(mut self, debugger: Rc<dyn Debugger>) -> Self {
        self.debugger = Some(debugger);
        self
    }

    /// Resume from a previously captured thread state.
    pub fn with_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }

    /// Check the option set for contradictions and missing pieces.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if let Some(tx) = self.tx {
            if self.input_idx >= tx.inputs.len() {
                return Err(Error::new(
                    ErrorCode::InvalidIndex,
                    format!(
                        "transaction input index {} is >= {}",
                        self.input_idx,
                        tx.inputs.len()
                    ),
                ));
            }
        }

        let output_has_locking_script = self.previous_tx_out.is_some();
        let tx_unlocking_script = self
            .tx
            .and_then(|tx| tx.inputs.get(self.input_idx))
            .and_then(|input| input.unlocking_script.as_ref());

        if self.locking_script.is_none() && !output_has_locking_script {
            return Err(Error::new(
                ErrorCode::InvalidParams,
                "no locking script provided".to_string(),
            ));
        }

        if self.unlocking_script.is_none() && tx_unlocking_script.is_none() {
            return Err(Error::new(
                ErrorCode::InvalidParams,
                "no unlocking script provided".to_string(),
            ));
        }

        // An explicit script must agree with the bound transaction.
        if let (Some(explicit), Some(prev_out)) = (self.locking_script, self.previous_tx_out) {
            if !explicit.equals(&prev_out.locking_script) {
                return Err(Error::new(
                    ErrorCode::InvalidParams,
                    "locking script does not match the previous output's locking script"
                        .to_string(),
                ));
            }
        }
        if let (Some(explicit), Some(from_tx)) = (self.unlocking_script, tx_unlocking_script) {
            if !explicit.equals(from_tx) {
                return Err(Error::new(
                    ErrorCode::InvalidParams,
                    "unlocking script does not match the requested input's unlocking script"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}
