// Transaction data structures and the signature-hash protocol

use std::io::Read;
use serde::{Deserialize, Serialize};
use crate::core::serialize::{
    read_fixed, read_u32, read_u64, read_u8, read_var_bytes, read_varint, write_var_bytes,
    write_varint, Serializable,
};
use crate::core::signature::{sign, verify};
use crate::core::{double_blake3_hash, Hash256, OutPoint, PrivKey, PubKey, Script, TxSignature};
use crate::error::{EbxError, Result};

/// Transaction input - references a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// Id of the transaction being spent
    pub input_tx_id: Hash256,
    /// Index of the output in that transaction
    pub input_tx_index: u32,
    /// Unlocking script
    pub script: Script,
    /// Minimum number of blocks since the spent output was confirmed
    pub lock_rel: u32,
}

impl TxIn {
    pub fn new(input_tx_id: Hash256, input_tx_index: u32, script: Script, lock_rel: u32) -> Self {
        Self {
            input_tx_id,
            input_tx_index,
            script,
            lock_rel,
        }
    }

    /// Create a coinbase input (for mining rewards)
    pub fn from_coinbase(script: Script) -> Self {
        Self {
            input_tx_id: Hash256::zero(),
            input_tx_index: u32::MAX,
            script,
            lock_rel: 0,
        }
    }

    /// Check if this is a coinbase input
    pub fn is_coinbase(&self) -> bool {
        self.input_tx_id == Hash256::zero() && self.input_tx_index == u32::MAX
    }

    /// Outpoint of the spent output
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.input_tx_id, self.input_tx_index)
    }
}

impl Serializable for TxIn {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.input_tx_id.as_ref());
        buf.extend_from_slice(&self.input_tx_index.to_le_bytes());
        write_var_bytes(buf, &self.script.to_bytes());
        buf.extend_from_slice(&self.lock_rel.to_le_bytes());
    }

    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let input_tx_id = read_fixed(reader)?;
        let input_tx_index = read_u32(reader)?;
        let script = Script::from_bytes(&read_var_bytes(reader)?)?;
        let lock_rel = read_u32(reader)?;
        Ok(Self {
            input_tx_id,
            input_tx_index,
            script,
            lock_rel,
        })
    }
}

/// Transaction output - amount and spending condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: u64,
    /// Locking script
    pub script: Script,
}

impl TxOut {
    pub fn new(value: u64, script: Script) -> Self {
        Self { value, script }
    }
}

impl Serializable for TxOut {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(buf, &self.script.to_bytes());
    }

    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let value = read_u64(reader)?;
        let script = Script::from_bytes(&read_var_bytes(reader)?)?;
        Ok(Self { value, script })
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub version: u8,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    /// Block number before which the transaction can't be confirmed
    pub lock_abs: u64,
}

/// Shared digests reused across every signature check of one transaction
///
/// Filled lazily by [`Tx::sighash_with_cache`]. A cache belongs to a single
/// transaction and must not be reused after the transaction changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashCache {
    pub prevouts_hash: Option<Hash256>,
    pub lock_rel_hash: Option<Hash256>,
    pub outputs_hash: Option<Hash256>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tx {
    pub const VERSION: u8 = 0;

    pub fn new(version: u8, inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_abs: u64) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_abs,
        }
    }

    /// Create a coinbase transaction (mining reward)
    pub fn from_coinbase(script: Script, output: TxOut, block_num: u64) -> Self {
        Self::new(Self::VERSION, vec![TxIn::from_coinbase(script)], vec![output], block_num)
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Transaction id: double BLAKE3 of the canonical bytes
    pub fn id(&self) -> Hash256 {
        double_blake3_hash(&self.to_bytes())
    }

    /// Sum of output values, `None` on overflow
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, out| total.checked_add(out.value))
    }

    fn hash_prevouts(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(self.inputs.len() * 36);
        for input in &self.inputs {
            buf.extend_from_slice(input.input_tx_id.as_ref());
            buf.extend_from_slice(&input.input_tx_index.to_le_bytes());
        }
        double_blake3_hash(&buf)
    }

    fn hash_lock_rel(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(self.inputs.len() * 4);
        for input in &self.inputs {
            buf.extend_from_slice(&input.lock_rel.to_le_bytes());
        }
        double_blake3_hash(&buf)
    }

    fn hash_outputs(&self) -> Hash256 {
        let mut buf = Vec::new();
        for output in &self.outputs {
            output.write_to(&mut buf);
        }
        double_blake3_hash(&buf)
    }

    /// Bytes committed to by a signature over input `input_index`
    ///
    /// `script` is the script being executed and `amount` the value of the
    /// spent output.
    pub fn sighash_preimage(
        &self,
        input_index: usize,
        script: &[u8],
        amount: u64,
        hash_type: u8,
        cache: &mut HashCache,
    ) -> Result<Vec<u8>> {
        let input = self
            .inputs
            .get(input_index)
            .ok_or(EbxError::InputOutOfRange(input_index))?;
        let anyone_can_pay = hash_type & TxSignature::SIGHASH_ANYONECANPAY != 0;
        let base_type = hash_type & 0x1f;

        let prevouts_hash = if anyone_can_pay {
            Hash256::zero()
        } else {
            *cache.prevouts_hash.get_or_insert_with(|| self.hash_prevouts())
        };

        let lock_rel_hash = if anyone_can_pay
            || base_type == TxSignature::SIGHASH_NONE
            || base_type == TxSignature::SIGHASH_SINGLE
        {
            Hash256::zero()
        } else {
            *cache.lock_rel_hash.get_or_insert_with(|| self.hash_lock_rel())
        };

        let outputs_hash = if base_type != TxSignature::SIGHASH_SINGLE
            && base_type != TxSignature::SIGHASH_NONE
        {
            *cache.outputs_hash.get_or_insert_with(|| self.hash_outputs())
        } else if base_type == TxSignature::SIGHASH_SINGLE {
            match self.outputs.get(input_index) {
                Some(output) => double_blake3_hash(&output.to_bytes()),
                None => Hash256::zero(),
            }
        } else {
            Hash256::zero()
        };

        let mut buf = Vec::with_capacity(32 * 4 + script.len() + 64);
        buf.push(self.version);
        buf.extend_from_slice(prevouts_hash.as_ref());
        buf.extend_from_slice(lock_rel_hash.as_ref());
        buf.extend_from_slice(input.input_tx_id.as_ref());
        buf.extend_from_slice(&input.input_tx_index.to_le_bytes());
        write_var_bytes(&mut buf, script);
        buf.extend_from_slice(&amount.to_le_bytes());
        buf.extend_from_slice(&input.lock_rel.to_le_bytes());
        buf.extend_from_slice(outputs_hash.as_ref());
        buf.extend_from_slice(&self.lock_abs.to_le_bytes());
        buf.push(hash_type);
        Ok(buf)
    }

    pub fn sighash_with_cache(
        &self,
        input_index: usize,
        script: &[u8],
        amount: u64,
        hash_type: u8,
        cache: &mut HashCache,
    ) -> Result<Hash256> {
        let preimage = self.sighash_preimage(input_index, script, amount, hash_type, cache)?;
        Ok(double_blake3_hash(&preimage))
    }

    pub fn sighash_no_cache(
        &self,
        input_index: usize,
        script: &[u8],
        amount: u64,
        hash_type: u8,
    ) -> Result<Hash256> {
        self.sighash_with_cache(input_index, script, amount, hash_type, &mut HashCache::new())
    }

    pub fn sign_with_cache(
        &self,
        input_index: usize,
        priv_key: &PrivKey,
        script: &[u8],
        amount: u64,
        hash_type: u8,
        cache: &mut HashCache,
    ) -> Result<TxSignature> {
        let digest = self.sighash_with_cache(input_index, script, amount, hash_type, cache)?;
        Ok(TxSignature::new(hash_type, sign(&digest, priv_key)?))
    }

    pub fn sign_no_cache(
        &self,
        input_index: usize,
        priv_key: &PrivKey,
        script: &[u8],
        amount: u64,
        hash_type: u8,
    ) -> Result<TxSignature> {
        self.sign_with_cache(input_index, priv_key, script, amount, hash_type, &mut HashCache::new())
    }

    /// Check `sig` against the digest selected by its own hash type
    pub fn verify_with_cache(
        &self,
        input_index: usize,
        pub_key: &PubKey,
        sig: &TxSignature,
        script: &[u8],
        amount: u64,
        cache: &mut HashCache,
    ) -> bool {
        match self.sighash_with_cache(input_index, script, amount, sig.hash_type, cache) {
            Ok(digest) => verify(&digest, pub_key, &sig.sig),
            Err(_) => false,
        }
    }

    pub fn verify_no_cache(
        &self,
        input_index: usize,
        pub_key: &PubKey,
        sig: &TxSignature,
        script: &[u8],
        amount: u64,
    ) -> bool {
        self.verify_with_cache(input_index, pub_key, sig, script, amount, &mut HashCache::new())
    }
}

impl Serializable for Tx {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.version);

        write_varint(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            input.write_to(buf);
        }

        write_varint(buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write_to(buf);
        }

        buf.extend_from_slice(&self.lock_abs.to_le_bytes());
    }

    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let version = read_u8(reader)?;

        // counts are untrusted, so grow the vectors as items actually arrive
        let input_count = read_varint(reader)?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            inputs.push(TxIn::read_from(reader)?);
        }

        let output_count = read_varint(reader)?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            outputs.push(TxOut::read_from(reader)?);
        }

        let lock_abs = read_u64(reader)?;

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_abs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KeyPair, Pkh};

    fn sample_tx() -> Tx {
        let script: Script = "OP_1 0x00ff".parse().unwrap();
        let inputs = vec![
            TxIn::new(Hash256::alloc(1), 0, script.clone(), 0),
            TxIn::new(Hash256::alloc(2), 3, Script::default(), 5),
        ];
        let outputs = vec![
            TxOut::new(100, script),
            TxOut::new(200, Script::default()),
        ];
        Tx::new(Tx::VERSION, inputs, outputs, 7)
    }

    #[test]
    fn test_coinbase_input() {
        let input = TxIn::from_coinbase(Script::default());
        assert!(input.is_coinbase());
        assert_eq!(input.input_tx_id, Hash256::zero());
        assert_eq!(input.input_tx_index, u32::MAX);
    }

    #[test]
    fn test_coinbase_transaction() {
        let output = TxOut::new(5000, Script::default());
        let tx = Tx::from_coinbase(Script::default(), output, 0);
        assert!(tx.is_coinbase());
        assert!(!sample_tx().is_coinbase());
    }

    #[test]
    fn test_transaction_serialization() {
        let tx = sample_tx();
        let bytes = tx.to_bytes();
        assert_eq!(bytes[0], Tx::VERSION);
        assert_eq!(&bytes[bytes.len() - 8..], &7u64.to_le_bytes());
        assert_eq!(Tx::from_bytes(&bytes).unwrap(), tx);
    }

    #[test]
    fn test_trailing_and_truncated() {
        let mut bytes = sample_tx().to_bytes();
        bytes.push(0);
        assert_eq!(Tx::from_bytes(&bytes), Err(EbxError::TrailingData));
        bytes.truncate(bytes.len() - 3);
        assert_eq!(Tx::from_bytes(&bytes), Err(EbxError::NotEnoughData));
    }

    #[test]
    fn test_txid() {
        let tx = sample_tx();
        assert_eq!(tx.id(), tx.id());
        let mut other = tx.clone();
        other.lock_abs += 1;
        assert_ne!(tx.id(), other.id());
    }

    #[test]
    fn test_serde_json() {
        let tx = sample_tx();
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"OP_1 0x00ff\""));
        assert_eq!(serde_json::from_str::<Tx>(&json).unwrap(), tx);
    }

    #[test]
    fn test_serde_json_keeps_bytes_and_id() {
        let mut tx = sample_tx();
        tx.outputs[1].script = Script::from_bytes(&[0xff, 0x51, 0x01]).unwrap();
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"OP_UNKNOWN_0xff OP_1 OP_UNKNOWN_0x01\""));

        let decoded: Tx = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.to_bytes(), tx.to_bytes());
        assert_eq!(decoded.id(), tx.id());
    }

    #[test]
    fn test_total_output_value() {
        assert_eq!(sample_tx().total_output_value(), Some(300));
        let mut tx = sample_tx();
        tx.outputs[0].value = u64::MAX;
        assert_eq!(tx.total_output_value(), None);
    }

    #[test]
    fn test_sighash_cache_agrees() {
        let tx = sample_tx();
        let script = [0x76u8, 0xa7];
        let hash_types = [
            TxSignature::SIGHASH_ALL,
            TxSignature::SIGHASH_NONE,
            TxSignature::SIGHASH_SINGLE,
            TxSignature::SIGHASH_ALL | TxSignature::SIGHASH_ANYONECANPAY,
            TxSignature::SIGHASH_SINGLE | TxSignature::SIGHASH_ANYONECANPAY,
        ];
        let mut cache = HashCache::new();
        for index in 0..tx.inputs.len() {
            for hash_type in hash_types {
                let cached = tx.sighash_with_cache(index, &script, 100, hash_type, &mut cache).unwrap();
                let fresh = tx.sighash_no_cache(index, &script, 100, hash_type).unwrap();
                assert_eq!(cached, fresh);
            }
        }
        assert!(cache.prevouts_hash.is_some());
        assert!(cache.outputs_hash.is_some());
    }

    #[test]
    fn test_sighash_commits_to_fields() {
        let tx = sample_tx();
        let all = TxSignature::SIGHASH_ALL;
        let base = tx.sighash_no_cache(0, &[], 100, all).unwrap();

        assert_ne!(base, tx.sighash_no_cache(0, &[], 101, all).unwrap());
        assert_ne!(base, tx.sighash_no_cache(1, &[], 100, all).unwrap());
        assert_ne!(base, tx.sighash_no_cache(0, &[0x51], 100, all).unwrap());

        let mut changed = tx.clone();
        changed.outputs[1].value = 201;
        assert_ne!(base, changed.sighash_no_cache(0, &[], 100, all).unwrap());

        // NONE doesn't cover outputs
        let none = TxSignature::SIGHASH_NONE;
        assert_eq!(
            tx.sighash_no_cache(0, &[], 100, none).unwrap(),
            changed.sighash_no_cache(0, &[], 100, none).unwrap()
        );
    }

    #[test]
    fn test_sighash_input_out_of_range() {
        let tx = sample_tx();
        assert_eq!(
            tx.sighash_no_cache(2, &[], 0, TxSignature::SIGHASH_ALL),
            Err(EbxError::InputOutOfRange(2))
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let tx = sample_tx();
        let script = Script::from_pkh_output(&Pkh::from_pub_key(&kp.pub_key)).to_bytes();
        let sig = tx
            .sign_no_cache(0, &kp.priv_key, &script, 100, TxSignature::SIGHASH_ALL)
            .unwrap();

        let mut cache = HashCache::new();
        assert!(tx.verify_with_cache(0, &kp.pub_key, &sig, &script, 100, &mut cache));
        assert!(tx.verify_no_cache(0, &kp.pub_key, &sig, &script, 100));
        assert!(!tx.verify_no_cache(0, &kp.pub_key, &sig, &script, 99));
        assert!(!tx.verify_no_cache(1, &kp.pub_key, &sig, &script, 100));
        assert!(!tx.verify_no_cache(5, &kp.pub_key, &sig, &script, 100));
    }
}
