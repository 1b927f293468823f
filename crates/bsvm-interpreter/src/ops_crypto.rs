//! Hashing and signature executors.

use num_bigint::BigInt;

use bsvm_primitives::ec::{PublicKey, Signature};
use bsvm_primitives::hash;
use bsvm_script::opcodes::OP_CODESEPARATOR;
use bsvm_script::Script;
use bsvm_transaction::sighash;

use crate::error::{Error, ErrorCode};
use crate::flags::ScriptFlags;
use crate::parsed_opcode::*;
use crate::thread::Thread;

/// Which digest OP_RIPEMD160..OP_HASH256 computes.
pub(crate) enum HashOp {
    Ripemd160,
    Sha1,
    Sha256,
    Hash160,
    Hash256,
}

impl<'a> Thread<'a> {
    pub(crate) fn op_hash(&mut self, hash_op: HashOp) -> Result<(), Error> {
        let buf = self.dstack.pop_byte_array()?;
        let result = match hash_op {
            HashOp::Ripemd160 => hash::ripemd160(&buf).to_vec(),
            HashOp::Sha1 => hash::sha1(&buf).to_vec(),
            HashOp::Sha256 => hash::sha256(&buf).to_vec(),
            HashOp::Hash160 => hash::hash160(&buf).to_vec(),
            HashOp::Hash256 => hash::sha256d(&buf).to_vec(),
        };
        self.dstack.push_byte_array(result);
        Ok(())
    }

    /// The part of the current script from just past the last
    /// OP_CODESEPARATOR to the end. The program counter has already
    /// advanced when OP_CODESEPARATOR records it, so the stored offset
    /// points at the first opcode after the separator.
    pub(crate) fn sub_script(&self) -> ParsedScript {
        self.scripts[self.script_idx][self.last_code_sep..].to_vec()
    }

    /// Hash the bound transaction and verify one signature.
    ///
    /// Picks the fork-id or legacy preimage based on the sighash type
    /// byte. Undecodable signatures or keys verify as false rather
    /// than erroring; encoding strictness is enforced separately by
    /// the check_* methods.
    fn verify_signature(
        &self,
        sig_der: &[u8],
        pub_key_bytes: &[u8],
        sub_script: &Script,
        shf: u32,
    ) -> Result<bool, Error> {
        let tx = self.tx.ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidParams,
                "tx and previous output must be supplied for checksig".to_string(),
            )
        })?;
        let prev_output = self.prev_output.ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidParams,
                "tx and previous output must be supplied for checksig".to_string(),
            )
        })?;

        let hash = if shf & sighash::SIGHASH_FORKID != 0 {
            sighash::signature_hash(
                tx,
                self.input_idx,
                sub_script.to_bytes(),
                shf,
                prev_output.satoshis,
            )
        } else {
            sighash::legacy_signature_hash(tx, self.input_idx, sub_script.to_bytes(), shf)
        }
        .map_err(|e| Error::new(ErrorCode::InvalidParams, e.to_string()))?;

        let sig = match Signature::from_der(sig_der) {
            Ok(s) => s,
            Err(_) => return Ok(false),
        };
        let pub_key = match PublicKey::from_bytes(pub_key_bytes) {
            Ok(k) => k,
            Err(_) => return Ok(false),
        };

        Ok(sig.verify(&hash, &pub_key))
    }

    pub(crate) fn op_checksig(&mut self) -> Result<(), Error> {
        let pk_bytes = self.dstack.pop_byte_array()?;
        let full_sig_bytes = self.dstack.pop_byte_array()?;

        if full_sig_bytes.is_empty() {
            self.dstack.push_bool(false);
            return Ok(());
        }

        let shf = *full_sig_bytes.last().expect("non-empty") as u32;
        let sig_bytes = &full_sig_bytes[..full_sig_bytes.len() - 1];

        self.check_hash_type_encoding(shf)?;
        self.check_signature_encoding(sig_bytes)?;
        self.check_pub_key_encoding(&pk_bytes)?;

        let mut sub_script = self.sub_script();

        // Legacy sighash covers the subscript itself, so the signature
        // push and any code separators must not appear in it.
        let has_forkid =
            self.has_flag(ScriptFlags::ENABLE_SIGHASH_FORKID) && (shf & sighash::SIGHASH_FORKID) != 0;
        if !has_forkid {
            sub_script = remove_opcode_by_data(&sub_script, &full_sig_bytes);
            sub_script = remove_opcode(&sub_script, OP_CODESEPARATOR);
        }

        let script_bytes = unparse(&sub_script);

        match self.verify_signature(sig_bytes, &pk_bytes, &script_bytes, shf) {
            Ok(valid) => {
                if !valid && self.has_flag(ScriptFlags::VERIFY_NULL_FAIL) && !sig_bytes.is_empty() {
                    return Err(Error::new(
                        ErrorCode::NullFail,
                        "signature not empty on failed checksig".to_string(),
                    ));
                }
                self.dstack.push_bool(valid);
                Ok(())
            }
            Err(e) if e.code == ErrorCode::InvalidParams => Err(e),
            Err(_) => {
                self.dstack.push_bool(false);
                Ok(())
            }
        }
    }

    pub(crate) fn op_checksigverify(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        self.op_checksig()?;
        self.abstract_verify(pop, ErrorCode::CheckSigVerify)
    }

    pub(crate) fn op_checkmultisig(&mut self) -> Result<(), Error> {
        let num_keys = self.dstack.pop_int()?;
        let num_pub_keys = num_keys.to_int() as i32;

        if num_pub_keys < 0 {
            return Err(Error::new(
                ErrorCode::InvalidPubKeyCount,
                format!("number of pubkeys {} is negative", num_pub_keys),
            ));
        }
        if num_pub_keys as usize > self.cfg.max_pub_keys_per_multisig() {
            return Err(Error::new(
                ErrorCode::InvalidPubKeyCount,
                format!(
                    "too many pubkeys: {} > {}",
                    num_pub_keys,
                    self.cfg.max_pub_keys_per_multisig()
                ),
            ));
        }

        // Every key counts toward the operation limit.
        self.num_ops += num_pub_keys as usize;
        if self.num_ops > self.cfg.max_ops() {
            return Err(Error::new(
                ErrorCode::TooManyOperations,
                format!("exceeded max operation limit of {}", self.cfg.max_ops()),
            ));
        }

        let mut pub_keys = Vec::with_capacity(num_pub_keys as usize);
        for _ in 0..num_pub_keys {
            pub_keys.push(self.dstack.pop_byte_array()?);
        }

        let num_sigs = self.dstack.pop_int()?;
        let num_signatures = num_sigs.to_int() as i32;

        if num_signatures < 0 {
            return Err(Error::new(
                ErrorCode::InvalidSignatureCount,
                format!("number of signatures {} is negative", num_signatures),
            ));
        }
        if num_signatures > num_pub_keys {
            return Err(Error::new(
                ErrorCode::InvalidSignatureCount,
                format!(
                    "more signatures than pubkeys: {} > {}",
                    num_signatures, num_pub_keys
                ),
            ));
        }

        let mut signatures: Vec<Vec<u8>> = Vec::with_capacity(num_signatures as usize);
        for _ in 0..num_signatures {
            signatures.push(self.dstack.pop_byte_array()?);
        }

        // The original implementation pops one item too many; the
        // dummy is consensus now.
        let dummy = self.dstack.pop_byte_array()?;
        if self.has_flag(ScriptFlags::STRICT_MULTI_SIG) && !dummy.is_empty() {
            return Err(Error::new(
                ErrorCode::SigNullDummy,
                format!(
                    "multisig dummy argument has length {} instead of 0",
                    dummy.len()
                ),
            ));
        }

        let mut scr = self.sub_script();
        for sig in &signatures {
            scr = remove_opcode_by_data(&scr, sig);
            scr = remove_opcode(&scr, OP_CODESEPARATOR);
        }
        let script_bytes = unparse(&scr);

        let mut success = true;
        let mut remaining_keys = num_pub_keys + 1;
        let mut pub_key_idx: i32 = -1;
        let mut sig_idx: usize = 0;
        let mut remaining_sigs = num_signatures;

        while remaining_sigs > 0 {
            pub_key_idx += 1;
            remaining_keys -= 1;

            // Fewer keys than pending signatures can never verify.
            if remaining_sigs > remaining_keys {
                success = false;
                break;
            }

            let sig = &signatures[sig_idx];
            let pub_key = &pub_keys[pub_key_idx as usize];

            if sig.is_empty() {
                continue;
            }

            let shf = *sig.last().expect("non-empty") as u32;
            let sig_only = &sig[..sig.len() - 1];

            self.check_hash_type_encoding(shf)?;
            self.check_signature_encoding(sig_only)?;
            self.check_pub_key_encoding(pub_key)?;

            if let Ok(true) = self.verify_signature(sig_only, pub_key, &script_bytes, shf) {
                sig_idx += 1;
                remaining_sigs -= 1;
            }
        }

        if !success && self.has_flag(ScriptFlags::VERIFY_NULL_FAIL) {
            for sig in &signatures {
                if !sig.is_empty() {
                    return Err(Error::new(
                        ErrorCode::NullFail,
                        "not all signatures empty on failed checkmultisig".to_string(),
                    ));
                }
            }
        }

        self.dstack.push_bool(success);
        Ok(())
    }

    pub(crate) fn op_checkmultisigverify(&mut self, pop: &ParsedOpcode) -> Result<(), Error> {
        self.op_checkmultisig()?;
        self.abstract_verify(pop, ErrorCode::CheckMultiSigVerify)
    }

    /// Validate a sighash type byte under strict encoding rules.
    pub(crate) fn check_hash_type_encoding(&self, shf: u32) -> Result<(), Error> {
        if !self.has_flag(ScriptFlags::VERIFY_STRICT_ENCODING) {
            return Ok(());
        }

        let mut sig_hash_type = shf & !sighash::SIGHASH_ANYONECANPAY;

        if self.has_flag(ScriptFlags::VERIFY_BIP143_SIGHASH) {
            sig_hash_type ^= sighash::SIGHASH_FORKID;
            if shf & sighash::SIGHASH_FORKID == 0 {
                return Err(Error::new(
                    ErrorCode::InvalidSigHashType,
                    format!("hash type does not contain uahf forkID 0x{:x}", shf),
                ));
            }
        }

        if sig_hash_type & sighash::SIGHASH_FORKID == 0 {
            if !(sighash::SIGHASH_ALL..=sighash::SIGHASH_SINGLE).contains(&sig_hash_type) {
                return Err(Error::new(
                    ErrorCode::InvalidSigHashType,
                    format!("invalid hash type 0x{:x}", shf),
                ));
            }
            return Ok(());
        }

        let base = sig_hash_type & !sighash::SIGHASH_FORKID;
        if !(sighash::SIGHASH_ALL..=sighash::SIGHASH_SINGLE).contains(&base) {
            return Err(Error::new(
                ErrorCode::InvalidSigHashType,
                format!("invalid hash type 0x{:x}", shf),
            ));
        }

        if !self.has_flag(ScriptFlags::ENABLE_SIGHASH_FORKID) && (shf & sighash::SIGHASH_FORKID != 0)
        {
            return Err(Error::new(
                ErrorCode::IllegalForkID,
                "fork id sighash set without flag".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate a public key's serialized form under strict encoding.
    pub(crate) fn check_pub_key_encoding(&self, pub_key: &[u8]) -> Result<(), Error> {
        if !self.has_flag(ScriptFlags::VERIFY_STRICT_ENCODING) {
            return Ok(());
        }
        if pub_key.len() == 33 && (pub_key[0] == 0x02 || pub_key[0] == 0x03) {
            return Ok(());
        }
        if pub_key.len() == 65 && pub_key[0] == 0x04 {
            return Ok(());
        }
        Err(Error::new(
            ErrorCode::PubKeyType,
            "unsupported public key type".to_string(),
        ))
    }

    /// Validate DER structure (and low-S when flagged) of a signature,
    /// excluding the sighash type byte. Empty signatures pass; they
    /// simply fail verification.
    pub(crate) fn check_signature_encoding(&self, sig: &[u8]) -> Result<(), Error> {
        if !self.has_any(&[
            ScriptFlags::VERIFY_DER_SIGNATURES,
            ScriptFlags::VERIFY_LOW_S,
            ScriptFlags::VERIFY_STRICT_ENCODING,
        ]) {
            return Ok(());
        }

        if sig.is_empty() {
            return Ok(());
        }

        let sig_len = sig.len();
        if sig_len < 8 {
            return Err(Error::new(
                ErrorCode::SigTooShort,
                format!("malformed signature: too short: {} < 8", sig_len),
            ));
        }
        if sig_len > 72 {
            return Err(Error::new(
                ErrorCode::SigTooLong,
                format!("malformed signature: too long: {} > 72", sig_len),
            ));
        }
        if sig[0] != 0x30 {
            return Err(Error::new(
                ErrorCode::SigInvalidSeqID,
                format!("malformed signature: format has wrong type: {:#x}", sig[0]),
            ));
        }
        if sig[1] as usize != sig_len - 2 {
            return Err(Error::new(
                ErrorCode::SigInvalidDataLen,
                format!("malformed signature: bad length: {} != {}", sig[1], sig_len - 2),
            ));
        }

        let r_len = sig[3] as usize;
        let s_type_offset = 4 + r_len;
        let s_len_offset = s_type_offset + 1;

        if s_type_offset >= sig_len {
            return Err(Error::new(
                ErrorCode::SigMissingSTypeID,
                "malformed signature: S type indicator missing".to_string(),
            ));
        }
        if s_len_offset >= sig_len {
            return Err(Error::new(
                ErrorCode::SigMissingSLen,
                "malformed signature: S length missing".to_string(),
            ));
        }

        let s_offset = s_len_offset + 1;
        let s_len = sig[s_len_offset] as usize;
        if s_offset + s_len != sig_len {
            return Err(Error::new(
                ErrorCode::SigInvalidSLen,
                "malformed signature: invalid S length".to_string(),
            ));
        }

        if sig[2] != 0x02 {
            return Err(Error::new(
                ErrorCode::SigInvalidRIntID,
                format!("malformed signature: R integer marker: {:#x} != 0x02", sig[2]),
            ));
        }
        if r_len == 0 {
            return Err(Error::new(
                ErrorCode::SigZeroRLen,
                "malformed signature: R length is zero".to_string(),
            ));
        }
        if sig[4] & 0x80 != 0 {
            return Err(Error::new(
                ErrorCode::SigNegativeR,
                "malformed signature: R is negative".to_string(),
            ));
        }
        if r_len > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
            return Err(Error::new(
                ErrorCode::SigTooMuchRPadding,
                "malformed signature: R value has too much padding".to_string(),
            ));
        }

        if sig[s_type_offset] != 0x02 {
            return Err(Error::new(
                ErrorCode::SigInvalidSIntID,
                format!(
                    "malformed signature: S integer marker: {:#x} != 0x02",
                    sig[s_type_offset]
                ),
            ));
        }
        if s_len == 0 {
            return Err(Error::new(
                ErrorCode::SigZeroSLen,
                "malformed signature: S length is zero".to_string(),
            ));
        }
        if sig[s_offset] & 0x80 != 0 {
            return Err(Error::new(
                ErrorCode::SigNegativeS,
                "malformed signature: S is negative".to_string(),
            ));
        }
        if s_len > 1 && sig[s_offset] == 0x00 && sig[s_offset + 1] & 0x80 == 0 {
            return Err(Error::new(
                ErrorCode::SigTooMuchSPadding,
                "malformed signature: S value has too much padding".to_string(),
            ));
        }

        if self.has_flag(ScriptFlags::VERIFY_LOW_S) {
            let half_order = BigInt::parse_bytes(
                b"7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0",
                16,
            )
            .expect("constant parses");
            let s_value =
                BigInt::from_bytes_be(num_bigint::Sign::Plus, &sig[s_offset..s_offset + s_len]);
            if s_value > half_order {
                return Err(Error::new(
                    ErrorCode::SigHighS,
                    "signature is not canonical due to unnecessarily high S value".to_string(),
                ));
            }
        }

        Ok(())
    }
}
