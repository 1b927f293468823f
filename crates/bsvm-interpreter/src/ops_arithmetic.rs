//! Numeric executors.

use crate::error::{Error, ErrorCode};
use crate::parsed_opcode::ParsedOpcode;
use crate::scriptnum::ScriptNumber;
use crate::thread::Thread;

impl<'a> Thread<'a> {
    pub(crate) fn op_unary_int(&mut self, f: impl FnOnce(&mut ScriptNumber)) -> Result<(), Error> {
        let mut m = self.dstack.pop_int()?;
        f(&mut m);
        self.dstack.push_int(&m);
        Ok(())
    }

    pub(crate) fn op_not(&mut self) -> Result<(), Error> {
        let m = self.dstack.pop_int()?;
        let n = if m.is_zero() { 1i64 } else { 0 };
        self.dstack
            .push_int(&ScriptNumber::new(n, self.after_genesis));
        Ok(())
    }

    pub(crate) fn op_0notequal(&mut self) -> Result<(), Error> {
        let mut m = self.dstack.pop_int()?;
        if !m.is_zero() {
            m.set(1);
        }
        self.dstack.push_int(&m);
        Ok(())
    }

    pub(crate) fn op_add(&mut self) -> Result<(), Error> {
        let mut v0 = self.dstack.pop_int()?;
        let v1 = self.dstack.pop_int()?;
        v0.add(&v1);
        self.dstack.push_int(&v0);
        Ok(())
    }

    pub(crate) fn op_sub(&mut self) -> Result<(), Error> {
        let v0 = self.dstack.pop_int()?;
        let mut v1 = self.dstack.pop_int()?;
        v1.sub(&v0);
        self.dstack.push_int(&v1);
        Ok(())
    }

    pub(crate) fn op_mul(&mut self) -> Result<(), Error> {
        let mut n1 = self.dstack.pop_int()?;
        let n2 = self.dstack.pop_int()?;
        n1.mul(&n2);
        self.dstack.push_int(&n1);
        Ok(())
    }

    pub(crate) fn op_div(&mut self) -> Result<(), Error> {
        let b = self.dstack.pop_int()?;
        let mut a = self.dstack.pop_int()?;
        if b.is_zero() {
            return Err(Error::new(
                ErrorCode::DivideByZero,
                "divide by zero".to_string(),
            ));
        }
        a.div(&b);
        self.dstack.push_int(&a);
        Ok(())
    }

    pub(crate) fn op_mod(&mut self) -> Result<(), Error> {
        let b = self.dstack.pop_int()?;
        let mut a = self.dstack.pop_int()?;
        if b.is_zero() {
            return Err(Error::new(
                ErrorCode::DivideByZero,
                "mod by zero".to_string(),
            ));
        }
        a.modulo(&b);
        self.dstack.push_int(&a);
        Ok(())
    }

    /// OP_LSHIFT: bitwise left shift over the raw bytes. The result
    /// keeps the operand's length; bits shifted past the top byte are
    /// lost.
    pub(crate) fn op_lshift(&mut self) -> Result<(), Error> {
        let num = self.dstack.pop_int()?;
        if num.less_than_int(0) {
            return Err(Error::new(
                ErrorCode::NumberTooSmall,
                "n less than 0".to_string(),
            ));
        }
        let n = num.to_int() as usize;
        let x = self.dstack.pop_byte_array()?;

        let bit_shift = n % 8;
        let byte_shift = n / 8;
        let masks: [u8; 8] = [0xFF, 0x7F, 0x3F, 0x1F, 0x0F, 0x07, 0x03, 0x01];
        let mask = masks[bit_shift];
        let overflow_mask = !mask;

        let mut result = vec![0u8; x.len()];
        for idx in (1..=x.len()).rev() {
            let i = idx - 1;
            if byte_shift <= i {
                let k = i - byte_shift;
                let val = (x[i] & mask) << bit_shift;
                result[k] |= val;
                if k >= 1 && bit_shift > 0 {
                    let carry = (x[i] & overflow_mask) >> (8 - bit_shift);
                    result[k - 1] |= carry;
                }
            }
        }
        self.dstack.push_byte_array(result);
        Ok(())
    }

    /// OP_RSHIFT: bitwise right shift over the raw bytes, same length
    /// contract as OP_LSHIFT.
    pub(crate) fn op_rshift(&mut self) -> Result<(), Error> {
        let num = self.dstack.pop_int()?;
        if num.less_than_int(0) {
            return Err(Error::new(
                ErrorCode::NumberTooSmall,
                "n less than 0".to_string(),
            ));
        }
        let n = num.to_int() as usize;
        let x = self.dstack.pop_byte_array()?;

        let byte_shift = n / 8;
        let bit_shift = n % 8;
        let masks: [u8; 8] = [0xFF, 0xFE, 0xFC, 0xF8, 0xF0, 0xE0, 0xC0, 0x80];
        let mask = masks[bit_shift];
        let overflow_mask = !mask;

        let mut result = vec![0u8; x.len()];
        for (i, &b) in x.iter().enumerate() {
            let k = i + byte_shift;
            if k < x.len() {
                let val = (b & mask) >> bit_shift;
                result[k] |= val;
            }
            if k + 1 < x.len() && bit_shift > 0 {
                let carry = (b & overflow_mask) << (8 - bit_shift);
                result[k + 1] |= carry;
            }
        }
        self.dstack.push_byte_array(result);
        Ok(())
    }

    /// Binary numeric comparison pushing a canonical boolean number.
    /// The callback sees (second-from-top, top).
    pub(crate) fn op_bool_binop(
        &mut self,
        f: impl FnOnce(&ScriptNumber, &ScriptNumber) -> bool,
    ) -> Result<(), Error> {
        let v0 = self.dstack.pop_int()?;
        let v1 = self.dstack.pop_int()?;
        let n = if f(&v1, &v0) { 1i64 } else { 0 };
        self.dstack
            .push_int(&ScriptNumber::new(n, self.after_genesis));
        Ok(())
    }

    pub(crate) fn op_numequalverify(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        self.op_bool_binop(|a, b| a.equal(b))?;
        self.abstract_verify(pop, ErrorCode::NumEqualVerify)
    }

    pub(crate) fn op_min(&mut self) -> Result<(), Error> {
        let v0 = self.dstack.pop_int()?;
        let v1 = self.dstack.pop_int()?;
        if v1.less_than(&v0) {
            self.dstack.push_int(&v1);
        } else {
            self.dstack.push_int(&v0);
        }
        Ok(())
    }

    pub(crate) fn op_max(&mut self) -> Result<(), Error> {
        let v0 = self.dstack.pop_int()?;
        let v1 = self.dstack.pop_int()?;
        if v1.greater_than(&v0) {
            self.dstack.push_int(&v1);
        } else {
            self.dstack.push_int(&v0);
        }
        Ok(())
    }

    /// OP_WITHIN: min <= x < max.
    pub(crate) fn op_within(&mut self) -> Result<(), Error> {
        let max_val = self.dstack.pop_int()?;
        let min_val = self.dstack.pop_int()?;
        let x = self.dstack.pop_int()?;
        let n = if min_val.less_than_or_equal(&x) && x.less_than(&max_val) {
            1i64
        } else {
            0
        };
        self.dstack
            .push_int(&ScriptNumber::new(n, self.after_genesis));
        Ok(())
    }
}
