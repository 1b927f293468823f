//! Parsed opcode representation and the script parser.

use bsvm_script::opcodes::*;
use bsvm_script::Script;

use crate::error::{Error, ErrorCode};

/// One opcode with its push payload, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOpcode {
    /// The opcode byte.
    pub opcode: u8,
    /// The pushed payload; empty for non-push opcodes.
    pub data: Vec<u8>,
    /// Set when this opcode is a truncated push at the end of the
    /// script. Such an opcode may be disassembled but fails if
    /// execution reaches it.
    pub malformed: bool,
}

impl ParsedOpcode {
    fn plain(opcode: u8) -> Self {
        ParsedOpcode {
            opcode,
            data: Vec::new(),
            malformed: false,
        }
    }

    /// Canonical opcode name.
    pub fn name(&self) -> &'static str {
        opcode_to_string(self.opcode)
    }

    /// True for the permanently disabled opcodes OP_2MUL and OP_2DIV.
    pub fn is_disabled(&self) -> bool {
        matches!(self.opcode, OP_2MUL | OP_2DIV)
    }

    /// True for OP_VERIF and OP_VERNOTIF, which are illegal even in
    /// unexecuted branches before Genesis.
    pub fn always_illegal(&self) -> bool {
        matches!(self.opcode, OP_VERIF | OP_VERNOTIF)
    }

    /// True for conditional flow-control opcodes.
    pub fn is_conditional(&self) -> bool {
        matches!(
            self.opcode,
            OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF | OP_VERIF | OP_VERNOTIF
        )
    }

    /// True for opcodes that cannot run without a bound transaction.
    pub fn requires_tx(&self) -> bool {
        matches!(
            self.opcode,
            OP_CHECKSIG
                | OP_CHECKSIGVERIFY
                | OP_CHECKMULTISIG
                | OP_CHECKMULTISIGVERIFY
                | OP_CHECKSEQUENCEVERIFY
        )
    }

    /// Enforce that this push uses the smallest possible opcode for its
    /// payload.
    pub fn enforce_minimum_data_push(&self) -> Result<(), Error> {
        let data_len = self.data.len();
        if data_len == 0 && self.opcode != OP_0 {
            return Err(Error::new(
                ErrorCode::MinimalData,
                format!(
                    "zero length data push is encoded with opcode {} instead of OP_0",
                    self.name()
                ),
            ));
        }
        if data_len == 1 && (1..=16).contains(&self.data[0]) && self.opcode != OP_1 + self.data[0] - 1
        {
            return Err(Error::new(
                ErrorCode::MinimalData,
                format!(
                    "data push of the value {} encoded with opcode {} instead of OP_{}",
                    self.data[0],
                    self.name(),
                    self.data[0]
                ),
            ));
        }
        if data_len == 1 && self.data[0] == 0x81 && self.opcode != OP_1NEGATE {
            return Err(Error::new(
                ErrorCode::MinimalData,
                format!(
                    "data push of the value -1 encoded with opcode {} instead of OP_1NEGATE",
                    self.name()
                ),
            ));
        }
        if data_len <= 75 {
            if self.opcode as usize != data_len {
                return Err(Error::new(
                    ErrorCode::MinimalData,
                    format!(
                        "data push of {} bytes encoded with opcode {} instead of OP_DATA_{}",
                        data_len,
                        self.name(),
                        data_len
                    ),
                ));
            }
        } else if data_len <= 255 {
            if self.opcode != OP_PUSHDATA1 {
                return Err(Error::new(
                    ErrorCode::MinimalData,
                    format!(
                        "data push of {} bytes encoded with opcode {} instead of OP_PUSHDATA1",
                        data_len,
                        self.name()
                    ),
                ));
            }
        } else if data_len <= 65535 && self.opcode != OP_PUSHDATA2 {
            return Err(Error::new(
                ErrorCode::MinimalData,
                format!(
                    "data push of {} bytes encoded with opcode {} instead of OP_PUSHDATA2",
                    data_len,
                    self.name()
                ),
            ));
        }
        Ok(())
    }

    /// True when the opcode is the smallest push form for its payload,
    /// or not a push at all. Non-canonical pushes are exempt from
    /// data-based opcode removal.
    pub fn canonical_push(&self) -> bool {
        let opcode = self.opcode;
        let data_len = self.data.len();
        if opcode > OP_16 {
            return true;
        }
        if opcode < OP_PUSHDATA1 && opcode > OP_0 && data_len == 1 && self.data[0] <= 16 {
            return false;
        }
        if opcode == OP_PUSHDATA1 && data_len < OP_PUSHDATA1 as usize {
            return false;
        }
        if opcode == OP_PUSHDATA2 && data_len <= 0xff {
            return false;
        }
        if opcode == OP_PUSHDATA4 && data_len <= 0xffff {
            return false;
        }
        true
    }

    /// Re-serialize to raw script bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.malformed {
            // The truncated tail kept only its opcode byte.
            return vec![self.opcode];
        }
        let mut out = vec![self.opcode];
        if self.opcode == OP_0
            || (self.opcode >= OP_1NEGATE && self.opcode <= OP_16)
            || self.opcode > OP_PUSHDATA4
        {
            // OP_RETURN is the one non-push opcode carrying data: the
            // parser hands it the unexecuted script tail.
            if self.opcode == OP_RETURN && !self.data.is_empty() {
                out.extend_from_slice(&self.data);
            }
            return out;
        }
        match self.opcode {
            OP_PUSHDATA1 => {
                out.push(self.data.len() as u8);
                out.extend_from_slice(&self.data);
            }
            OP_PUSHDATA2 => {
                out.extend_from_slice(&(self.data.len() as u16).to_le_bytes());
                out.extend_from_slice(&self.data);
            }
            OP_PUSHDATA4 => {
                out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
                out.extend_from_slice(&self.data);
            }
            _ => {
                out.extend_from_slice(&self.data);
            }
        }
        out
    }

    /// Render as a disassembly token: hex for pushes, the name
    /// otherwise, the literal `[error]` for a truncated push.
    pub fn disasm_string(&self) -> String {
        if self.malformed {
            return "[error]".to_string();
        }
        if self.opcode > OP_0 && self.opcode <= OP_PUSHDATA4 {
            return hex::encode(&self.data);
        }
        self.name().to_string()
    }
}

/// A fully parsed script.
pub type ParsedScript = Vec<ParsedOpcode>;

/// True when every opcode is a push (value at or below OP_16).
pub fn is_push_only(script: &ParsedScript) -> bool {
    script.iter().all(|op| op.opcode <= OP_16)
}

/// Remove canonical pushes whose payload equals `data` exactly.
///
/// This is the signature-stripping primitive for legacy sighash
/// subscripts: comparison is whole-payload, never substring, so pushes
/// that merely embed the needle survive.
pub fn remove_opcode_by_data(script: &ParsedScript, data: &[u8]) -> ParsedScript {
    script
        .iter()
        .filter(|pop| !pop.canonical_push() || pop.data != data)
        .cloned()
        .collect()
}

/// Remove every occurrence of `opcode`.
pub fn remove_opcode(script: &ParsedScript, opcode: u8) -> ParsedScript {
    script
        .iter()
        .filter(|pop| pop.opcode != opcode)
        .cloned()
        .collect()
}

/// Re-serialize a parsed script back into a `Script`.
pub fn unparse(pscript: &ParsedScript) -> Script {
    let mut bytes = Vec::new();
    for pop in pscript {
        bytes.extend_from_slice(&pop.to_bytes());
    }
    Script::from_bytes(&bytes)
}

/// Render a parsed script as a space-separated disassembly string.
pub fn disassemble(pscript: &ParsedScript) -> String {
    let parts: Vec<String> = pscript
        .iter()
        .map(|pop| pop.disasm_string())
        .filter(|s| !s.is_empty())
        .collect();
    parts.join(" ")
}

/// Parse raw script bytes into executable opcodes.
///
/// Push opcodes consume their declared payload. A push that runs past
/// the end of the script does not abort the parse: the trailing opcode
/// is kept, flagged malformed, and parsing stops; execution fails only
/// if the program counter reaches it. A top-level OP_RETURN absorbs the
/// remaining bytes as its payload.
///
/// With `error_on_checksig` set (no transaction bound to the engine),
/// any opcode requiring transaction context fails the parse with
/// `InvalidParams`.
pub fn parse_script(script: &Script, error_on_checksig: bool) -> Result<ParsedScript, Error> {
    let scr = script.to_bytes();
    let mut parsed_ops = Vec::new();
    let mut conditional_depth = 0i32;
    let mut i = 0;

    while i < scr.len() {
        let instruction = scr[i];
        let mut parsed_op = ParsedOpcode::plain(instruction);

        if error_on_checksig && parsed_op.requires_tx() {
            return Err(Error::new(
                ErrorCode::InvalidParams,
                "tx and previous output must be supplied for checksig".to_string(),
            ));
        }

        match instruction {
            OP_IF | OP_NOTIF | OP_VERIF | OP_VERNOTIF => conditional_depth += 1,
            OP_ENDIF => {
                if conditional_depth > 0 {
                    conditional_depth -= 1;
                }
            }
            OP_RETURN if conditional_depth == 0 => {
                if i + 1 < scr.len() {
                    parsed_op.data = scr[i + 1..].to_vec();
                }
                parsed_ops.push(parsed_op);
                return Ok(parsed_ops);
            }
            _ => {}
        }

        match instruction {
            OP_PUSHDATA1 => {
                if i + 1 >= scr.len() {
                    parsed_op.malformed = true;
                    parsed_ops.push(parsed_op);
                    return Ok(parsed_ops);
                }
                let data_len = scr[i + 1] as usize;
                if i + 2 + data_len > scr.len() {
                    parsed_op.malformed = true;
                    parsed_ops.push(parsed_op);
                    return Ok(parsed_ops);
                }
                parsed_op.data = scr[i + 2..i + 2 + data_len].to_vec();
                i += 2 + data_len;
            }
            OP_PUSHDATA2 => {
                if i + 2 >= scr.len() {
                    parsed_op.malformed = true;
                    parsed_ops.push(parsed_op);
                    return Ok(parsed_ops);
                }
                let data_len = u16::from_le_bytes([scr[i + 1], scr[i + 2]]) as usize;
                if i + 3 + data_len > scr.len() {
                    parsed_op.malformed = true;
                    parsed_ops.push(parsed_op);
                    return Ok(parsed_ops);
                }
                parsed_op.data = scr[i + 3..i + 3 + data_len].to_vec();
                i += 3 + data_len;
            }
            OP_PUSHDATA4 => {
                if i + 4 >= scr.len() {
                    parsed_op.malformed = true;
                    parsed_ops.push(parsed_op);
                    return Ok(parsed_ops);
                }
                let data_len =
                    u32::from_le_bytes([scr[i + 1], scr[i + 2], scr[i + 3], scr[i + 4]]) as usize;
                if i + 5 + data_len > scr.len() {
                    parsed_op.malformed = true;
                    parsed_ops.push(parsed_op);
                    return Ok(parsed_ops);
                }
                parsed_op.data = scr[i + 5..i + 5 + data_len].to_vec();
                i += 5 + data_len;
            }
            op if (OP_DATA_1..=OP_DATA_75).contains(&op) => {
                let data_len = op as usize;
                if i + 1 + data_len > scr.len() {
                    parsed_op.malformed = true;
                    parsed_ops.push(parsed_op);
                    return Ok(parsed_ops);
                }
                parsed_op.data = scr[i + 1..i + 1 + data_len].to_vec();
                i += 1 + data_len;
            }
            _ => {
                i += 1;
            }
        }

        parsed_ops.push(parsed_op);
    }

    Ok(parsed_ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_hex(h: &str) -> ParsedScript {
        parse_script(&Script::from_hex(h).unwrap(), false).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let ops = parse_hex("5456");
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].opcode, OP_4);
        assert_eq!(ops[1].opcode, OP_6);
    }

    #[test]
    fn test_parse_pushes() {
        let ops = parse_hex("0501020304054c020a0b");
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].data, vec![1, 2, 3, 4, 5]);
        assert_eq!(ops[1].opcode, OP_PUSHDATA1);
        assert_eq!(ops[1].data, vec![0x0a, 0x0b]);
    }

    #[test]
    fn test_parse_truncated_push_keeps_error_opcode() {
        // OP_1 then OP_PUSHDATA1 claiming 5 bytes with only 2 present.
        let ops = parse_hex("514c050102");
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].opcode, OP_1);
        assert!(!ops[0].malformed);
        assert_eq!(ops[1].opcode, OP_PUSHDATA1);
        assert!(ops[1].malformed);
        assert!(ops[1].data.is_empty());
    }

    #[test]
    fn test_disassemble_truncated_push() {
        let ops = parse_hex("514c050102");
        assert_eq!(disassemble(&ops), "OP_1 [error]");
    }

    #[test]
    fn test_parse_truncated_direct_push() {
        let ops = parse_hex("0500");
        assert_eq!(ops.len(), 1);
        assert!(ops[0].malformed);
    }

    #[test]
    fn test_round_trip() {
        for h in [
            "5456",
            "5253958852529387",
            "76a914e2a623699e81b291c0327f408fea765d534baa2a88ac",
            "0501020304054c020a0b",
            "004f51606a",
        ] {
            let script = Script::from_hex(h).unwrap();
            let ops = parse_script(&script, false).unwrap();
            assert!(ops.iter().all(|op| !op.malformed));
            assert_eq!(unparse(&ops).to_hex(), h, "round trip {}", h);
        }
    }

    #[test]
    fn test_op_return_absorbs_tail() {
        let ops = parse_hex("516a0102");
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].opcode, OP_RETURN);
        assert_eq!(ops[1].data, vec![0x01, 0x02]);
        // Still round-trips through to_bytes.
        assert_eq!(unparse(&ops).to_hex(), "516a0102");
    }

    #[test]
    fn test_op_return_in_conditional_does_not_absorb() {
        let ops = parse_hex("51636a68");
        assert_eq!(ops.len(), 4);
        assert!(ops[2].data.is_empty());
    }

    #[test]
    fn test_error_on_checksig() {
        let script = Script::from_hex("76a914e2a623699e81b291c0327f408fea765d534baa2a88ac").unwrap();
        let result = parse_script(&script, true);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code, ErrorCode::InvalidParams);
    }

    #[test]
    fn test_is_push_only() {
        assert!(is_push_only(&parse_hex("00510203045160")));
        assert!(!is_push_only(&parse_hex("5176")));
    }

    #[test]
    fn test_remove_opcode_by_data_exact_match() {
        // Two pushes; only the exact payload match is removed.
        let ops = parse_hex("020a0b030a0b0c");
        let removed = remove_opcode_by_data(&ops, &[0x0a, 0x0b]);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].data, vec![0x0a, 0x0b, 0x0c]);
        // A push embedding the needle is not removed.
        let removed2 = remove_opcode_by_data(&ops, &[0x0a]);
        assert_eq!(removed2.len(), 2);
    }

    #[test]
    fn test_remove_opcode() {
        let ops = parse_hex("51ab52ab53");
        let removed = remove_opcode(&ops, OP_CODESEPARATOR);
        assert_eq!(removed.len(), 3);
        assert_eq!(unparse(&removed).to_hex(), "515253");
    }

    #[test]
    fn test_minimal_push_enforcement() {
        // 1-byte value 5 pushed with OP_DATA_1 instead of OP_5.
        let ops = parse_hex("0105");
        assert!(ops[0].enforce_minimum_data_push().is_err());
        // Empty push must use OP_0.
        let ops2 = parse_hex("4c00");
        assert!(ops2[0].enforce_minimum_data_push().is_err());
        // 20-byte push with OP_DATA_20 is minimal.
        let ok2 = parse_hex("14aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert!(ok2[0].enforce_minimum_data_push().is_ok());
    }
}
