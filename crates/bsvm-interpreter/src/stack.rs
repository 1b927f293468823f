//! Execution stacks.

use std::rc::Rc;

use crate::debug::Debugger;
use crate::error::{Error, ErrorCode};
use crate::scriptnum::ScriptNumber;

/// Interpret a byte string as a boolean.
///
/// Anything nonzero is true, except negative zero (a lone sign bit in
/// the top byte) which is false.
pub fn as_bool(t: &[u8]) -> bool {
    for i in 0..t.len() {
        if t[i] != 0 {
            if i == t.len() - 1 && t[i] == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}

/// Encode a boolean as a stack item.
pub fn from_bool(v: bool) -> Vec<u8> {
    if v {
        vec![1]
    } else {
        vec![]
    }
}

/// A byte-string stack with typed pop/peek accessors.
///
/// Numeric access decodes with the stack's configured operand length
/// cap, minimal-encoding flag, and Genesis flag. Every push and pop is
/// reported to the attached debugger.
pub struct Stack {
    stk: Vec<Vec<u8>>,
    pub max_num_length: usize,
    pub after_genesis: bool,
    pub verify_minimal_data: bool,
    debug: Rc<dyn Debugger>,
}

impl Stack {
    pub fn new(
        max_num_length: usize,
        after_genesis: bool,
        verify_minimal_data: bool,
        debug: Rc<dyn Debugger>,
    ) -> Self {
        Stack {
            stk: Vec::new(),
            max_num_length,
            after_genesis,
            verify_minimal_data,
            debug,
        }
    }

    pub fn depth(&self) -> i32 {
        self.stk.len() as i32
    }

    pub fn push_byte_array(&mut self, data: Vec<u8>) {
        self.debug.before_stack_push(&data);
        self.stk.push(data);
        self.debug
            .after_stack_push(self.stk.last().expect("just pushed"));
    }

    pub fn push_int(&mut self, n: &ScriptNumber) {
        self.push_byte_array(n.to_bytes());
    }

    pub fn push_bool(&mut self, val: bool) {
        self.push_byte_array(from_bool(val));
    }

    pub fn pop_byte_array(&mut self) -> Result<Vec<u8>, Error> {
        self.debug.before_stack_pop();
        let data = self.nip_n(0)?;
        self.debug.after_stack_pop(&data);
        Ok(data)
    }

    pub fn pop_int(&mut self) -> Result<ScriptNumber, Error> {
        let data = self.pop_byte_array()?;
        ScriptNumber::from_bytes(
            &data,
            self.max_num_length,
            self.verify_minimal_data,
            self.after_genesis,
        )
    }

    pub fn pop_bool(&mut self) -> Result<bool, Error> {
        let data = self.pop_byte_array()?;
        Ok(as_bool(&data))
    }

    /// Copy the item `idx` entries down from the top (0 = top).
    pub fn peek_byte_array(&self, idx: i32) -> Result<Vec<u8>, Error> {
        let sz = self.stk.len() as i32;
        if idx < 0 || idx >= sz {
            return Err(Error::new(
                ErrorCode::InvalidStackOperation,
                format!("index {} is invalid for stack size {}", idx, sz),
            ));
        }
        Ok(self.stk[(sz - idx - 1) as usize].clone())
    }

    pub fn peek_int(&self, idx: i32) -> Result<ScriptNumber, Error> {
        let data = self.peek_byte_array(idx)?;
        ScriptNumber::from_bytes(
            &data,
            self.max_num_length,
            self.verify_minimal_data,
            self.after_genesis,
        )
    }

    pub fn peek_bool(&self, idx: i32) -> Result<bool, Error> {
        let data = self.peek_byte_array(idx)?;
        Ok(as_bool(&data))
    }

    /// Remove and return the item `idx` entries down from the top.
    fn nip_n(&mut self, idx: i32) -> Result<Vec<u8>, Error> {
        let sz = self.stk.len() as i32;
        if idx < 0 || idx > sz - 1 {
            return Err(Error::new(
                ErrorCode::InvalidStackOperation,
                format!("index {} is invalid for stack size {}", idx, sz),
            ));
        }
        let pos = (sz - idx - 1) as usize;
        Ok(self.stk.remove(pos))
    }

    /// Remove the item `idx` entries down, discarding it (OP_NIP).
    pub fn nip_n_discard(&mut self, idx: i32) -> Result<(), Error> {
        self.nip_n(idx)?;
        Ok(())
    }

    /// OP_TUCK: copy the top item below the second-from-top.
    pub fn tuck(&mut self) -> Result<(), Error> {
        let so2 = self.pop_byte_array()?;
        let so1 = self.pop_byte_array()?;
        self.push_byte_array(so2.clone());
        self.push_byte_array(so1);
        self.push_byte_array(so2);
        Ok(())
    }

    /// Drop the top `n` items.
    pub fn drop_n(&mut self, n: i32) -> Result<(), Error> {
        if n < 1 {
            return Err(Error::new(
                ErrorCode::InvalidStackOperation,
                format!("attempt to drop {} items from stack", n),
            ));
        }
        for _ in 0..n {
            self.pop_byte_array()?;
        }
        Ok(())
    }

    /// Duplicate the top `n` items.
    pub fn dup_n(&mut self, n: i32) -> Result<(), Error> {
        if n < 1 {
            return Err(Error::new(
                ErrorCode::InvalidStackOperation,
                format!("attempt to dup {} stack items", n),
            ));
        }
        for _ in (0..n).rev() {
            let so = self.peek_byte_array(n - 1)?;
            self.push_byte_array(so);
        }
        Ok(())
    }

    /// Rotate the top `3n` items by `n` (OP_ROT, OP_2ROT).
    pub fn rot_n(&mut self, n: i32) -> Result<(), Error> {
        if n < 1 {
            return Err(Error::new(
                ErrorCode::InvalidStackOperation,
                format!("attempt to rotate {} stack items", n),
            ));
        }
        let entry = 3 * n - 1;
        for _ in (0..n).rev() {
            let so = self.nip_n(entry)?;
            self.push_byte_array(so);
        }
        Ok(())
    }

    /// Swap the top `n` items with the `n` below them.
    pub fn swap_n(&mut self, n: i32) -> Result<(), Error> {
        if n < 1 {
            return Err(Error::new(
                ErrorCode::InvalidStackOperation,
                format!("attempt to swap {} stack items", n),
            ));
        }
        let entry = 2 * n - 1;
        for _ in (0..n).rev() {
            let so = self.nip_n(entry)?;
            self.push_byte_array(so);
        }
        Ok(())
    }

    /// Copy the `n` items below the top `n` onto the top.
    pub fn over_n(&mut self, n: i32) -> Result<(), Error> {
        if n < 1 {
            return Err(Error::new(
                ErrorCode::InvalidStackOperation,
                format!("attempt to perform over on {} stack items", n),
            ));
        }
        let entry = 2 * n - 1;
        for _ in (0..n).rev() {
            let so = self.peek_byte_array(entry)?;
            self.push_byte_array(so);
        }
        Ok(())
    }

    /// OP_PICK: copy the item `n` deep onto the top.
    pub fn pick_n(&mut self, n: i32) -> Result<(), Error> {
        let so = self.peek_byte_array(n)?;
        self.push_byte_array(so);
        Ok(())
    }

    /// OP_ROLL: move the item `n` deep onto the top.
    pub fn roll_n(&mut self, n: i32) -> Result<(), Error> {
        let so = self.nip_n(n)?;
        self.push_byte_array(so);
        Ok(())
    }

    /// Clone the whole stack, bottom first.
    pub fn get_stack(&self) -> Vec<Vec<u8>> {
        self.stk.clone()
    }

    /// Replace the stack contents (last item becomes the top).
    pub fn set_stack(&mut self, data: Vec<Vec<u8>>) {
        self.stk = data;
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.stk.clear();
    }
}

/// Tracks whether an OP_ELSE has been seen in each open conditional
/// block.
pub struct BoolStack {
    stk: Vec<bool>,
}

impl BoolStack {
    pub fn new() -> Self {
        BoolStack { stk: Vec::new() }
    }

    pub fn push_bool(&mut self, b: bool) {
        self.stk.push(b);
    }

    pub fn pop_bool(&mut self) -> Result<bool, Error> {
        self.stk.pop().ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidStackOperation,
                "bool stack empty".to_string(),
            )
        })
    }

    pub fn depth(&self) -> i32 {
        self.stk.len() as i32
    }

    pub fn get_stack(&self) -> Vec<bool> {
        self.stk.clone()
    }

    pub fn set_stack(&mut self, data: Vec<bool>) {
        self.stk = data;
    }
}

impl Default for BoolStack {
    fn default() -> Self {
        Self::new()
    }
}
