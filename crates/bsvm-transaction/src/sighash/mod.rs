//! Signature hash computation.
//!
//! Produces the 32-byte digest that ECDSA signs to authorize spending an
//! input. Two algorithms exist: the BIP-143-style preimage used whenever
//! the sighash type carries `SIGHASH_FORKID` (every post-UAHF BSV
//! transaction), and the legacy algorithm over a modified serialized
//! transaction for pre-fork types.
//!
//! See <https://github.com/bitcoin-sv/bitcoin-sv/blob/master/doc/abc/replay-protected-sighash.md#digest-algorithm>

use bsvm_primitives::hash::sha256d;
use bsvm_primitives::util::{ByteWriter, VarInt};

use crate::transaction::Transaction;
use crate::TransactionError;

/// Sign all inputs and all outputs (the default).
pub const SIGHASH_ALL: u32 = 0x01;

/// Sign all inputs but no outputs.
pub const SIGHASH_NONE: u32 = 0x02;

/// Sign all inputs and only the output at the signed input's index.
pub const SIGHASH_SINGLE: u32 = 0x03;

/// Sign only the current input, letting others be added later.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Replay-protection bit required on post-UAHF BSV signatures.
pub const SIGHASH_FORKID: u32 = 0x40;

/// The standard BSV sighash type: ALL | FORKID.
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

/// Mask extracting the base type (ALL, NONE, SINGLE).
pub const SIGHASH_MASK: u32 = 0x1f;

/// Opcode byte stripped from legacy script code.
const OP_CODESEPARATOR: u8 = 0xab;

// -----------------------------------------------------------------------
// Fork-id (BIP-143 style)
// -----------------------------------------------------------------------

/// Compute the fork-id signature hash for one input.
///
/// Double-SHA-256 of the preimage from [`calc_preimage`]. `satoshis` is
/// the value of the output being spent; `prev_output_script` is the
/// script code (the spent locking script, or its code-separator tail).
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    prev_output_script: &[u8],
    sighash_type: u32,
    satoshis: u64,
) -> Result<[u8; 32], TransactionError> {
    let preimage = calc_preimage(tx, input_index, prev_output_script, sighash_type, satoshis)?;
    Ok(sha256d(&preimage))
}

/// Build the fork-id preimage bytes before the final double hash.
///
/// Field order:
/// 1. nVersion (4 LE)
/// 2. hashPrevouts (32) — sha256d of all outpoints, zero under ANYONECANPAY
/// 3. hashSequence (32) — sha256d of all sequences, zero under
///    ANYONECANPAY/SINGLE/NONE
/// 4. outpoint (32+4)
/// 5. scriptCode (varint-prefixed)
/// 6. value (8 LE)
/// 7. nSequence (4 LE)
/// 8. hashOutputs (32) — all outputs, the single matching output, or zero
/// 9. nLocktime (4 LE)
/// 10. sighashType (4 LE)
pub fn calc_preimage(
    tx: &Transaction,
    input_index: usize,
    prev_output_script: &[u8],
    sighash_type: u32,
    satoshis: u64,
) -> Result<Vec<u8>, TransactionError> {
    if input_index >= tx.inputs.len() {
        return Err(TransactionError::InvalidTransaction(format!(
            "input index {} out of range (tx has {} inputs)",
            input_index,
            tx.inputs.len()
        )));
    }

    let input = &tx.inputs[input_index];
    let base_type = sighash_type & SIGHASH_MASK;

    let hash_prevouts = if sighash_type & SIGHASH_ANYONECANPAY == 0 {
        prevouts_hash(tx)
    } else {
        [0u8; 32]
    };

    let hash_sequence = if sighash_type & SIGHASH_ANYONECANPAY == 0
        && base_type != SIGHASH_SINGLE
        && base_type != SIGHASH_NONE
    {
        sequence_hash(tx)
    } else {
        [0u8; 32]
    };

    let hash_outputs = if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        outputs_hash(tx, None)
    } else if base_type == SIGHASH_SINGLE && input_index < tx.outputs.len() {
        outputs_hash(tx, Some(input_index))
    } else {
        [0u8; 32]
    };

    let mut writer = ByteWriter::with_capacity(256);
    writer.write_u32_le(tx.version);
    writer.write_bytes(&hash_prevouts);
    writer.write_bytes(&hash_sequence);
    writer.write_bytes(&input.source_txid);
    writer.write_u32_le(input.source_tx_out_index);
    writer.write_varint(VarInt::from(prev_output_script.len()));
    writer.write_bytes(prev_output_script);
    writer.write_u64_le(satoshis);
    writer.write_u32_le(input.sequence_number);
    writer.write_bytes(&hash_outputs);
    writer.write_u32_le(tx.lock_time);
    writer.write_u32_le(sighash_type);
    Ok(writer.into_bytes())
}

fn prevouts_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = ByteWriter::with_capacity(tx.inputs.len() * 36);
    for input in &tx.inputs {
        writer.write_bytes(&input.source_txid);
        writer.write_u32_le(input.source_tx_out_index);
    }
    sha256d(writer.as_bytes())
}

fn sequence_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = ByteWriter::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        writer.write_u32_le(input.sequence_number);
    }
    sha256d(writer.as_bytes())
}

/// Hash all outputs, or just the one at `only` for SIGHASH_SINGLE.
fn outputs_hash(tx: &Transaction, only: Option<usize>) -> [u8; 32] {
    let mut writer = ByteWriter::new();
    match only {
        None => {
            for output in &tx.outputs {
                writer.write_bytes(&output.bytes_for_sig_hash());
            }
        }
        Some(n) => writer.write_bytes(&tx.outputs[n].bytes_for_sig_hash()),
    }
    sha256d(writer.as_bytes())
}

// -----------------------------------------------------------------------
// Legacy (pre-fork)
// -----------------------------------------------------------------------

/// Compute the legacy signature hash for one input.
///
/// Serializes a modified copy of the transaction: the signed input gets
/// the script code (code separators removed), the others an empty script
/// (and a zeroed sequence under NONE/SINGLE); outputs are kept, dropped,
/// or truncated per the base type. SIGHASH_SINGLE with an input index
/// beyond the outputs yields the historical constant one-hash.
pub fn legacy_signature_hash(
    tx: &Transaction,
    input_index: usize,
    prev_output_script: &[u8],
    sighash_type: u32,
) -> Result<[u8; 32], TransactionError> {
    if input_index >= tx.inputs.len() {
        return Err(TransactionError::InvalidTransaction(format!(
            "input index {} out of range (tx has {} inputs)",
            input_index,
            tx.inputs.len()
        )));
    }

    let base_type = sighash_type & SIGHASH_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;

    // The historical out-of-range SIGHASH_SINGLE result.
    if base_type == SIGHASH_SINGLE && input_index >= tx.outputs.len() {
        let mut one = [0u8; 32];
        one[0] = 0x01;
        return Ok(one);
    }

    let sub_script = strip_code_separators(prev_output_script);

    let mut writer = ByteWriter::with_capacity(256);
    writer.write_u32_le(tx.version);

    // Inputs.
    if anyone_can_pay {
        writer.write_varint(VarInt::from(1u64));
        tx.inputs[input_index].write_with_script(&mut writer, &sub_script);
    } else {
        writer.write_varint(VarInt::from(tx.inputs.len()));
        for (i, input) in tx.inputs.iter().enumerate() {
            if i == input_index {
                input.write_with_script(&mut writer, &sub_script);
            } else {
                let mut blanked = input.clone();
                if base_type == SIGHASH_NONE || base_type == SIGHASH_SINGLE {
                    blanked.sequence_number = 0;
                }
                blanked.write_with_script(&mut writer, &[]);
            }
        }
    }

    // Outputs.
    match base_type {
        SIGHASH_NONE => {
            writer.write_varint(VarInt::from(0u64));
        }
        SIGHASH_SINGLE => {
            // Outputs before the signed index are blanked with value -1
            // and an empty script; the signed output is kept.
            writer.write_varint(VarInt::from(input_index + 1));
            for _ in 0..input_index {
                writer.write_i64_le(-1);
                writer.write_varint(VarInt::from(0u64));
            }
            writer.write_bytes(&tx.outputs[input_index].bytes_for_sig_hash());
        }
        _ => {
            writer.write_varint(VarInt::from(tx.outputs.len()));
            for output in &tx.outputs {
                writer.write_bytes(&output.bytes_for_sig_hash());
            }
        }
    }

    writer.write_u32_le(tx.lock_time);
    writer.write_u32_le(sighash_type);
    Ok(sha256d(writer.as_bytes()))
}

/// Remove every OP_CODESEPARATOR from a script at the byte level,
/// stepping over push payloads so embedded 0xab bytes survive.
fn strip_code_separators(script: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(script.len());
    let mut i = 0;
    while i < script.len() {
        let next = next_op(script, i);
        if script[i] != OP_CODESEPARATOR {
            out.extend_from_slice(&script[i..next]);
        }
        i = next;
    }
    out
}

/// Return the offset just past the opcode starting at `i`, including any
/// push payload. Truncated pushes consume the rest of the script.
fn next_op(script: &[u8], i: usize) -> usize {
    let op = script[i];
    let end = match op {
        0x01..=0x4b => i + 1 + op as usize,
        // OP_PUSHDATA1
        0x4c => {
            if i + 1 >= script.len() {
                return script.len();
            }
            i + 2 + script[i + 1] as usize
        }
        // OP_PUSHDATA2
        0x4d => {
            if i + 2 >= script.len() {
                return script.len();
            }
            i + 3 + u16::from_le_bytes([script[i + 1], script[i + 2]]) as usize
        }
        // OP_PUSHDATA4
        0x4e => {
            if i + 4 >= script.len() {
                return script.len();
            }
            i + 5
                + u32::from_le_bytes([
                    script[i + 1],
                    script[i + 2],
                    script[i + 3],
                    script[i + 4],
                ]) as usize
        }
        _ => i + 1,
    };
    end.min(script.len())
}
