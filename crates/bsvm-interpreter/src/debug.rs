//! Execution observation hooks.
//!
//! A `Debugger` receives callbacks around execution, stepping, and stack
//! traffic. Hooks are strictly observational: they get snapshots or
//! borrowed data and have no way to mutate the running thread. The
//! default implementation of every method is a no-op, so implementors
//! override only what they watch.

/// Snapshot of a thread's mutable state.
///
/// Captured by [`crate::thread::Thread::state`] and restorable with
/// [`crate::thread::Thread::set_state`], which together allow pausing
/// and resuming an execution.
#[derive(Clone, Debug, Default)]
pub struct State {
    /// Data stack contents, bottom first.
    pub data_stack: Vec<Vec<u8>>,
    /// Alt stack contents, bottom first.
    pub alt_stack: Vec<Vec<u8>>,
    /// Else-marker stack mirroring the conditional stack.
    pub else_stack: Vec<bool>,
    /// Conditional execution stack (false/true/skip markers).
    pub cond_stack: Vec<i32>,
    /// Data stack snapshot taken after the unlocking script (BIP16).
    pub saved_first_stack: Vec<Vec<u8>>,
    /// Index of the executing script.
    pub script_idx: usize,
    /// Offset of the next opcode within the executing script.
    pub script_off: usize,
    /// Offset just past the most recent OP_CODESEPARATOR.
    pub last_code_sep: usize,
    /// Non-push opcodes executed in the current script.
    pub num_ops: usize,
    /// Whether a post-Genesis OP_RETURN has been hit under a
    /// conditional.
    pub early_return_after_genesis: bool,
}

/// Observer interface for script execution.
pub trait Debugger {
    /// Called once before the first step.
    fn before_execute(&self, _state: &State) {}
    /// Called once after stepping ends, on success or failure.
    fn after_execute(&self, _state: &State) {}
    /// Called before each step.
    fn before_step(&self, _state: &State) {}
    /// Called after each successful step.
    fn after_step(&self, _state: &State) {}
    /// Called before `data` is pushed onto a stack.
    fn before_stack_push(&self, _data: &[u8]) {}
    /// Called after a push completes.
    fn after_stack_push(&self, _data: &[u8]) {}
    /// Called before a pop.
    fn before_stack_pop(&self) {}
    /// Called after a pop with the removed data.
    fn after_stack_pop(&self, _data: &[u8]) {}
    /// Called when the final check passes and execution succeeds.
    fn on_success(&self, _state: &State) {}
}

/// The default observer: ignores everything.
pub struct NopDebugger;

impl Debugger for NopDebugger {}
