//! Transaction input referencing a previous output.

use bsvm_primitives::util::{ByteReader, ByteWriter, VarInt};
use bsvm_script::Script;

use crate::TransactionError;

/// Sequence number of a finalized input (no relative lock-time).
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// A single input in a transaction.
///
/// References the output being spent by txid and index, and carries the
/// unlocking script (scriptSig) that satisfies that output's locking
/// script.
///
/// # Wire format
///
/// | Field               | Size          |
/// |---------------------|---------------|
/// | source_txid         | 32 bytes (LE) |
/// | source_tx_out_index | 4 bytes (LE)  |
/// | script length       | VarInt        |
/// | unlocking_script    | variable      |
/// | sequence_number     | 4 bytes (LE)  |
#[derive(Clone, Debug)]
pub struct TransactionInput {
    /// Transaction ID of the output being spent, internal byte order.
    pub source_txid: [u8; 32],

    /// Index of the output within the source transaction.
    pub source_tx_out_index: u32,

    /// The unlocking script. `None` before signing.
    pub unlocking_script: Option<Script>,

    /// Sequence number; `0xFFFFFFFF` means finalized.
    pub sequence_number: u32,
}

impl TransactionInput {
    /// Create an input with zeroed outpoint and finalized sequence.
    pub fn new() -> Self {
        TransactionInput {
            source_txid: [0u8; 32],
            source_tx_out_index: 0,
            unlocking_script: None,
            sequence_number: DEFAULT_SEQUENCE_NUMBER,
        }
    }

    /// Deserialize an input from `reader`.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let txid_bytes = reader.read_bytes(32).map_err(|e| {
            TransactionError::SerializationError(format!("reading source txid: {}", e))
        })?;
        let mut source_txid = [0u8; 32];
        source_txid.copy_from_slice(txid_bytes);

        let source_tx_out_index = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading output index: {}", e))
        })?;

        let script_len = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading script length: {}", e))
        })?;
        let script_bytes = reader.read_bytes(script_len.value() as usize).map_err(|e| {
            TransactionError::SerializationError(format!("reading unlocking script: {}", e))
        })?;

        let sequence_number = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading sequence number: {}", e))
        })?;

        let unlocking_script = if script_bytes.is_empty() {
            None
        } else {
            Some(Script::from_bytes(script_bytes))
        };

        Ok(TransactionInput {
            source_txid,
            source_tx_out_index,
            unlocking_script,
            sequence_number,
        })
    }

    /// Serialize this input into `writer`.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.source_txid);
        writer.write_u32_le(self.source_tx_out_index);
        match &self.unlocking_script {
            Some(script) => {
                let script_bytes = script.to_bytes();
                writer.write_varint(VarInt::from(script_bytes.len()));
                writer.write_bytes(script_bytes);
            }
            None => writer.write_varint(VarInt::from(0u64)),
        }
        writer.write_u32_le(self.sequence_number);
    }

    /// Serialize with the unlocking script replaced by `script_override`.
    ///
    /// The legacy signature hash serializes each input with either an
    /// empty script or the subscript being signed.
    pub(crate) fn write_with_script(&self, writer: &mut ByteWriter, script_override: &[u8]) {
        writer.write_bytes(&self.source_txid);
        writer.write_u32_le(self.source_tx_out_index);
        writer.write_varint(VarInt::from(script_override.len()));
        writer.write_bytes(script_override);
        writer.write_u32_le(self.sequence_number);
    }

    /// Serialize this input to wire-format bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }
}

impl Default for TransactionInput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut input = TransactionInput::new();
        input.source_txid = [0xab; 32];
        input.source_tx_out_index = 7;
        input.unlocking_script = Some(Script::from_hex("5151").unwrap());
        input.sequence_number = 0xfffffffe;

        let bytes = input.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        let back = TransactionInput::read_from(&mut reader).unwrap();
        assert_eq!(back.source_txid, input.source_txid);
        assert_eq!(back.source_tx_out_index, 7);
        assert_eq!(back.unlocking_script.unwrap().to_hex(), "5151");
        assert_eq!(back.sequence_number, 0xfffffffe);
    }

    #[test]
    fn test_empty_script_reads_as_none() {
        let input = TransactionInput::new();
        let bytes = input.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        let back = TransactionInput::read_from(&mut reader).unwrap();
        assert!(back.unlocking_script.is_none());
    }
}
