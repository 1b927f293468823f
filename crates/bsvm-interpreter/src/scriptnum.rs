//! The consensus numeric type.
//!
//! Stack numbers are little-endian byte strings with a sign bit in the
//! most significant bit of the top byte; the empty string is zero.
//! Operands are capped at 4 bytes before Genesis, but results may grow
//! past that and remain valid until something reinterprets them as a
//! number, so the value itself is kept as a big integer.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::{Error, ErrorCode};

/// A script number with unbounded magnitude.
#[derive(Debug, Clone)]
pub struct ScriptNumber {
    /// The numeric value.
    pub val: BigInt,
    /// Whether post-Genesis rules were active when this number was made.
    pub after_genesis: bool,
}

impl ScriptNumber {
    /// Create a script number from an i64.
    pub fn new(val: i64, after_genesis: bool) -> Self {
        ScriptNumber {
            val: BigInt::from(val),
            after_genesis,
        }
    }

    /// Decode a byte string into a script number.
    ///
    /// Fails with `NumberTooBig` when the encoding exceeds `max_len`
    /// bytes, and with `MinimalData` when `require_minimal` is set and
    /// the encoding carries padding (including negative zero).
    pub fn from_bytes(
        bb: &[u8],
        max_len: usize,
        require_minimal: bool,
        after_genesis: bool,
    ) -> Result<Self, Error> {
        if bb.len() > max_len {
            return Err(Error::new(
                ErrorCode::NumberTooBig,
                format!(
                    "numeric value encoded as {:02x?} is {} bytes which exceeds the max allowed of {}",
                    bb,
                    bb.len(),
                    max_len
                ),
            ));
        }

        if require_minimal {
            check_minimal_data_encoding(bb)?;
        }

        if bb.is_empty() {
            return Ok(ScriptNumber {
                val: BigInt::zero(),
                after_genesis,
            });
        }

        let mut v = BigInt::zero();
        for (i, &b) in bb.iter().enumerate() {
            v |= BigInt::from(b) << (8 * i);
        }

        // Sign bit set in the top byte means negative magnitude.
        if bb[bb.len() - 1] & 0x80 != 0 {
            let mask = !(BigInt::from(0x80_i64) << (8 * (bb.len() - 1)));
            v &= mask;
            v = -v;
        }

        Ok(ScriptNumber {
            val: v,
            after_genesis,
        })
    }

    /// Encode to the unique minimal little-endian sign-magnitude form.
    ///
    /// Zero encodes as the empty string. An extra 0x00/0x80 byte is
    /// appended only when the magnitude's own top bit is set.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.val.is_zero() {
            return vec![];
        }

        let is_negative = self.val.is_negative();
        let mut magnitude = self.val.abs();

        let mut result: Vec<u8> = Vec::new();
        while magnitude > BigInt::zero() {
            result.push((&magnitude & BigInt::from(0xff_u8)).to_u8().unwrap_or(0));
            magnitude >>= 8;
        }

        if result[result.len() - 1] & 0x80 != 0 {
            result.push(if is_negative { 0x80 } else { 0x00 });
        } else if is_negative {
            let last = result.len() - 1;
            result[last] |= 0x80;
        }

        result
    }

    // Arithmetic. Operations mutate in place and return self for
    // chaining.

    pub fn add(&mut self, other: &ScriptNumber) -> &mut Self {
        self.val = &self.val + &other.val;
        self
    }

    pub fn sub(&mut self, other: &ScriptNumber) -> &mut Self {
        self.val = &self.val - &other.val;
        self
    }

    pub fn mul(&mut self, other: &ScriptNumber) -> &mut Self {
        self.val = &self.val * &other.val;
        self
    }

    /// Divide, truncating toward zero.
    pub fn div(&mut self, other: &ScriptNumber) -> &mut Self {
        let (q, _) = self.val.div_rem(&other.val);
        self.val = q;
        self
    }

    /// Truncated remainder; takes the sign of the dividend.
    pub fn modulo(&mut self, other: &ScriptNumber) -> &mut Self {
        let (_, r) = self.val.div_rem(&other.val);
        self.val = r;
        self
    }

    pub fn incr(&mut self) -> &mut Self {
        self.val = &self.val + BigInt::one();
        self
    }

    pub fn decr(&mut self) -> &mut Self {
        self.val = &self.val - BigInt::one();
        self
    }

    pub fn neg(&mut self) -> &mut Self {
        self.val = -self.val.clone();
        self
    }

    pub fn abs(&mut self) -> &mut Self {
        if self.val.is_negative() {
            self.val = -self.val.clone();
        }
        self
    }

    pub fn set(&mut self, i: i64) -> &mut Self {
        self.val = BigInt::from(i);
        self
    }

    // Comparisons.

    pub fn is_zero(&self) -> bool {
        self.val.is_zero()
    }

    pub fn less_than(&self, other: &ScriptNumber) -> bool {
        self.val < other.val
    }

    pub fn less_than_int(&self, i: i64) -> bool {
        self.val < BigInt::from(i)
    }

    pub fn less_than_or_equal(&self, other: &ScriptNumber) -> bool {
        self.val <= other.val
    }

    pub fn greater_than(&self, other: &ScriptNumber) -> bool {
        self.val > other.val
    }

    pub fn greater_than_int(&self, i: i64) -> bool {
        self.val > BigInt::from(i)
    }

    pub fn greater_than_or_equal(&self, other: &ScriptNumber) -> bool {
        self.val >= other.val
    }

    pub fn equal(&self, other: &ScriptNumber) -> bool {
        self.val == other.val
    }

    pub fn equal_int(&self, i: i64) -> bool {
        self.val == BigInt::from(i)
    }

    // Conversions.

    /// Convert to i32, clamping at the i32 range edges.
    pub fn to_i32(&self) -> i32 {
        match self.val.to_i64() {
            Some(v) => {
                if v > i32::MAX as i64 {
                    i32::MAX
                } else if v < i32::MIN as i64 {
                    i32::MIN
                } else {
                    v as i32
                }
            }
            None => {
                if self.val.is_positive() {
                    i32::MAX
                } else {
                    i32::MIN
                }
            }
        }
    }

    /// Convert to i64, clamping at the i64 range edges.
    pub fn to_i64(&self) -> i64 {
        if self.greater_than_int(i64::MAX) {
            return i64::MAX;
        }
        if self.less_than_int(i64::MIN) {
            return i64::MIN;
        }
        self.val.to_i64().unwrap_or(0)
    }

    /// Convert to i64, returning 0 if the value does not fit.
    pub fn to_int(&self) -> i64 {
        self.val.to_i64().unwrap_or(0)
    }
}

/// Reduce a byte string to its minimal numeric encoding (OP_BIN2NUM).
pub fn minimally_encode(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return vec![];
    }

    let mut data = data.to_vec();
    let last = data[data.len() - 1];

    if last & 0x7f != 0 {
        return data;
    }

    if data.len() == 1 {
        return vec![];
    }

    if data[data.len() - 2] & 0x80 != 0 {
        return data;
    }

    let mut i = data.len() - 1;
    while i > 0 {
        if data[i - 1] != 0 {
            if data[i - 1] & 0x80 != 0 {
                data[i] = last;
                return data[..=i].to_vec();
            }
            data[i - 1] |= last;
            return data[..i].to_vec();
        }
        i -= 1;
    }

    vec![]
}

/// Fail with `MinimalData` if `v` carries a padding byte or is negative
/// zero.
pub fn check_minimal_data_encoding(v: &[u8]) -> Result<(), Error> {
    if v.is_empty() {
        return Ok(());
    }

    if v[v.len() - 1] & 0x7f == 0 {
        if v.len() == 1 || v[v.len() - 2] & 0x80 == 0 {
            return Err(Error::new(
                ErrorCode::MinimalData,
                format!("numeric value encoded as {:02x?} is not minimally encoded", v),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_to_bytes(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn test_encode_known_values() {
        let tests: Vec<(i64, Vec<u8>)> = vec![
            (0, vec![]),
            (1, hex_to_bytes("01")),
            (-1, hex_to_bytes("81")),
            (127, hex_to_bytes("7f")),
            (-127, hex_to_bytes("ff")),
            (128, hex_to_bytes("8000")),
            (-128, hex_to_bytes("8080")),
            (129, hex_to_bytes("8100")),
            (-129, hex_to_bytes("8180")),
            (256, hex_to_bytes("0001")),
            (-256, hex_to_bytes("0081")),
            (32767, hex_to_bytes("ff7f")),
            (-32767, hex_to_bytes("ffff")),
            (32768, hex_to_bytes("008000")),
            (-32768, hex_to_bytes("008080")),
            (65535, hex_to_bytes("ffff00")),
            (-65535, hex_to_bytes("ffff80")),
            (524288, hex_to_bytes("000008")),
            (-524288, hex_to_bytes("000088")),
            (7340032, hex_to_bytes("000070")),
            (-7340032, hex_to_bytes("0000f0")),
            (8388608, hex_to_bytes("00008000")),
            (-8388608, hex_to_bytes("00008080")),
            (2147483647, hex_to_bytes("ffffff7f")),
            (-2147483647, hex_to_bytes("ffffffff")),
            // Result values past the 4-byte operand cap stay encodable.
            (2147483648, hex_to_bytes("0000008000")),
            (-2147483648, hex_to_bytes("0000008080")),
            (4294967295, hex_to_bytes("ffffffff00")),
            (-4294967295, hex_to_bytes("ffffffff80")),
            (4294967296, hex_to_bytes("0000000001")),
            (-4294967296, hex_to_bytes("0000000081")),
            (281474976710655, hex_to_bytes("ffffffffffff00")),
            (-281474976710655, hex_to_bytes("ffffffffffff80")),
            (72057594037927935, hex_to_bytes("ffffffffffffff00")),
            (-72057594037927935, hex_to_bytes("ffffffffffffff80")),
            (9223372036854775807, hex_to_bytes("ffffffffffffff7f")),
            (-9223372036854775807, hex_to_bytes("ffffffffffffffff")),
        ];

        for (num, expected) in &tests {
            let got = ScriptNumber::new(*num, true).to_bytes();
            assert_eq!(&got, expected, "encode({})", num);
        }
    }

    #[test]
    fn test_decode() {
        struct Test {
            serialized: Vec<u8>,
            num: i64,
            num_len: usize,
            minimal: bool,
            expect_err: bool,
        }

        let tests = vec![
            // Negative zero is rejected under minimal encoding.
            Test { serialized: hex_to_bytes("80"), num: 0, num_len: 4, minimal: true, expect_err: true },
            Test { serialized: vec![], num: 0, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("01"), num: 1, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("81"), num: -1, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("7f"), num: 127, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("ff"), num: -127, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("8000"), num: 128, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("8080"), num: -128, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("0001"), num: 256, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("0081"), num: -256, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("ffffff7f"), num: 2147483647, num_len: 4, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("ffffffff"), num: -2147483647, num_len: 4, minimal: true, expect_err: false },
            // CLTV/CSV-style 5-byte operands.
            Test { serialized: hex_to_bytes("ffffffff7f"), num: 549755813887, num_len: 5, minimal: true, expect_err: false },
            Test { serialized: hex_to_bytes("ffffffffff"), num: -549755813887, num_len: 5, minimal: true, expect_err: false },
            // Too long for a 4-byte operand.
            Test { serialized: hex_to_bytes("0000008000"), num: 0, num_len: 4, minimal: true, expect_err: true },
            // Padding rejected when minimal encoding is required.
            Test { serialized: hex_to_bytes("00"), num: 0, num_len: 4, minimal: true, expect_err: true },
            Test { serialized: hex_to_bytes("0100"), num: 0, num_len: 4, minimal: true, expect_err: true },
            // The same bytes accepted without the flag.
            Test { serialized: hex_to_bytes("00"), num: 0, num_len: 4, minimal: false, expect_err: false },
            Test { serialized: hex_to_bytes("0100"), num: 1, num_len: 4, minimal: false, expect_err: false },
        ];

        for test in &tests {
            let result =
                ScriptNumber::from_bytes(&test.serialized, test.num_len, test.minimal, true);
            match result {
                Ok(sn) => {
                    assert!(
                        !test.expect_err,
                        "from_bytes({:02x?}): expected error",
                        test.serialized
                    );
                    assert_eq!(sn.to_int(), test.num, "from_bytes({:02x?})", test.serialized);
                }
                Err(_) => {
                    assert!(
                        test.expect_err,
                        "from_bytes({:02x?}): unexpected error",
                        test.serialized
                    );
                }
            }
        }
    }

    #[test]
    fn test_truncated_division() {
        // Division truncates toward zero; remainder takes the dividend's
        // sign.
        let cases: Vec<(i64, i64, i64, i64)> = vec![
            (7, 3, 2, 1),
            (-7, 3, -2, -1),
            (7, -3, -2, 1),
            (-7, -3, 2, -1),
        ];
        for (a, b, q, r) in cases {
            let mut x = ScriptNumber::new(a, true);
            x.div(&ScriptNumber::new(b, true));
            assert_eq!(x.to_int(), q, "{} / {}", a, b);

            let mut y = ScriptNumber::new(a, true);
            y.modulo(&ScriptNumber::new(b, true));
            assert_eq!(y.to_int(), r, "{} % {}", a, b);
        }
    }

    #[test]
    fn test_i32_clamping() {
        let tests: Vec<(i64, i32)> = vec![
            (0, 0),
            (1, 1),
            (-1, -1),
            (2147483647, 2147483647),
            (-2147483648, -2147483648),
            (2147483648, 2147483647),
            (-2147483649, -2147483648),
            (9223372036854775807, 2147483647),
        ];
        for (input, want) in &tests {
            assert_eq!(ScriptNumber::new(*input, false).to_i32(), *want);
        }
    }

    #[test]
    fn test_minimally_encode() {
        assert_eq!(minimally_encode(&[]), Vec::<u8>::new());
        assert_eq!(minimally_encode(&[0x7f]), vec![0x7f]);
        assert_eq!(minimally_encode(&[0x00]), Vec::<u8>::new());
        assert_eq!(minimally_encode(&[0x80]), Vec::<u8>::new());
        assert_eq!(minimally_encode(&[0x01, 0x00]), vec![0x01]);
        assert_eq!(minimally_encode(&[0x01, 0x80]), vec![0x81]);
        assert_eq!(minimally_encode(&[0x80, 0x00]), vec![0x80, 0x00]);
        assert_eq!(minimally_encode(&[0x01, 0x02, 0x00]), vec![0x01, 0x02]);
    }
}
