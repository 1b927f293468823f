//! Pay-to-Public-Key-Hash locking and unlocking scripts.
//!
//! Locking: `OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG`.
//! Unlocking: `<DER signature + sighash byte> <pubkey>`.

use bsvm_primitives::ec::{PrivateKey, Signature};
use bsvm_script::opcodes::*;
use bsvm_script::Script;

use crate::sighash::{self, SIGHASH_ALL_FORKID};
use crate::transaction::Transaction;
use crate::TransactionError;

/// Build a P2PKH locking script for a 20-byte public key hash.
pub fn lock(public_key_hash: &[u8; 20]) -> Script {
    let mut bytes = Vec::with_capacity(25);
    bytes.push(OP_DUP);
    bytes.push(OP_HASH160);
    bytes.push(OP_DATA_20);
    bytes.extend_from_slice(public_key_hash);
    bytes.push(OP_EQUALVERIFY);
    bytes.push(OP_CHECKSIG);
    Script::from_bytes(&bytes)
}

/// Sign input `input_index` of `tx` and build its unlocking script.
///
/// `prev_locking_script` and `prev_satoshis` describe the output being
/// spent. The sighash type defaults to `SIGHASH_ALL | SIGHASH_FORKID`.
pub fn unlock(
    tx: &Transaction,
    input_index: usize,
    prev_locking_script: &Script,
    prev_satoshis: u64,
    private_key: &PrivateKey,
    sighash_flag: Option<u32>,
) -> Result<Script, TransactionError> {
    let sighash_type = sighash_flag.unwrap_or(SIGHASH_ALL_FORKID);
    let hash = if sighash_type & sighash::SIGHASH_FORKID != 0 {
        sighash::signature_hash(
            tx,
            input_index,
            prev_locking_script.to_bytes(),
            sighash_type,
            prev_satoshis,
        )?
    } else {
        sighash::legacy_signature_hash(
            tx,
            input_index,
            prev_locking_script.to_bytes(),
            sighash_type,
        )?
    };
    let sig = Signature::sign(&hash, private_key)?;

    let mut sig_with_type = sig.to_der();
    sig_with_type.push(sighash_type as u8);

    let mut script = Script::new();
    script.append_push_data(&sig_with_type)?;
    script.append_push_data(&private_key.pub_key().to_bytes())?;
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TransactionInput;
    use crate::output::TransactionOutput;
    use bsvm_primitives::hash::hash160;

    #[test]
    fn test_lock_shape() {
        let script = lock(&[0xaa; 20]);
        assert!(script.is_p2pkh());
        assert_eq!(script.len(), 25);
    }

    #[test]
    fn test_unlock_signs_and_verifies() {
        let key = PrivateKey::from_bytes(&[0x77u8; 32]).unwrap();
        let pkh = hash160(&key.pub_key().to_bytes());
        let locking = lock(&pkh);

        let mut input = TransactionInput::new();
        input.source_txid = [0x11; 32];
        let tx = Transaction {
            version: 1,
            inputs: vec![input],
            outputs: vec![TransactionOutput::with_script(900, lock(&[0x22; 20]))],
            lock_time: 0,
        };

        let unlocking = unlock(&tx, 0, &locking, 1000, &key, None).unwrap();
        let chunks = unlocking.chunks().unwrap();
        assert_eq!(chunks.len(), 2);

        // The pushed signature verifies against the fork-id sighash.
        let sig_bytes = chunks[0].data.as_ref().unwrap();
        let sig = Signature::from_der(&sig_bytes[..sig_bytes.len() - 1]).unwrap();
        let hash =
            sighash::signature_hash(&tx, 0, locking.to_bytes(), SIGHASH_ALL_FORKID, 1000).unwrap();
        assert!(sig.verify(&hash, &key.pub_key()));
    }
}
