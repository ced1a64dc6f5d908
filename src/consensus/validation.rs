// Transaction and block validation

use std::collections::HashSet;
use crate::consensus::interpreter::ScriptInterpreter;
use crate::consensus::merkle::MerkleTxs;
use crate::core::{Block, HashCache, OutPoint, Tx, TxOutMap};
use crate::error::ScriptError;

/// Validation error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Transaction has no inputs or outputs
    EmptyTransaction,
    /// The same outpoint is spent twice
    DuplicateInput { index: usize },
    /// Spent output is not in the output map
    MissingOutput { index: usize },
    /// Input script contains non-push opcodes
    InputScriptNotPushOnly { index: usize },
    /// Input or output script evaluated to false or halted
    ScriptFailed { index: usize, error: Option<ScriptError> },
    /// Outputs spend more than the inputs provide
    InsufficientInputValue { inputs: u64, outputs: u64 },
    /// Value sum does not fit in 64 bits
    ValueOverflow,
    /// Block has no transactions
    NoTransactions,
    /// First transaction is not coinbase
    MissingCoinbase,
    /// Coinbase transaction in non-first position
    CoinbaseNotFirst { index: usize },
    /// Merkle root doesn't match calculated value
    InvalidMerkleRoot,
    /// Transaction locked until a later block
    TxLocked { index: usize, lock_abs: u64 },
    /// Input spends an output younger than its `lock_rel` blocks
    InputLocked { index: usize, lock_rel: u32 },
    /// Transaction at `index` of a block failed
    InvalidTransaction { index: usize, error: Box<ValidationError> },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ValidationError::EmptyTransaction => write!(f, "Empty transaction"),
            ValidationError::DuplicateInput { index } => write!(f, "Input {} spends an outpoint twice", index),
            ValidationError::MissingOutput { index } => write!(f, "Input {} spends an unknown output", index),
            ValidationError::InputScriptNotPushOnly { index } => {
                write!(f, "Input {} script is not push-only", index)
            }
            ValidationError::ScriptFailed { index, error: Some(error) } => {
                write!(f, "Input {} script failed: {}", index, error)
            }
            ValidationError::ScriptFailed { index, error: None } => {
                write!(f, "Input {} script evaluated to false", index)
            }
            ValidationError::InsufficientInputValue { inputs, outputs } => {
                write!(f, "Outputs ({}) exceed inputs ({})", outputs, inputs)
            }
            ValidationError::ValueOverflow => write!(f, "Value overflow"),
            ValidationError::NoTransactions => write!(f, "Block has no transactions"),
            ValidationError::MissingCoinbase => write!(f, "Missing coinbase transaction"),
            ValidationError::CoinbaseNotFirst { index } => {
                write!(f, "Coinbase not in first position (index {})", index)
            }
            ValidationError::InvalidMerkleRoot => write!(f, "Invalid merkle root"),
            ValidationError::TxLocked { index, lock_abs } => {
                write!(f, "Transaction {} locked until block {}", index, lock_abs)
            }
            ValidationError::InputLocked { index, lock_rel } => {
                write!(f, "Input {} locked for {} blocks after its output", index, lock_rel)
            }
            ValidationError::InvalidTransaction { index, error } => {
                write!(f, "Transaction {}: {}", index, error)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Verifies a transaction against the outputs it spends
///
/// One [`HashCache`] is shared by every input, so the common sighash digests
/// are computed once per transaction.
pub struct TxVerifier<'a> {
    tx: &'a Tx,
    tx_out_map: &'a TxOutMap,
    hash_cache: HashCache,
}

impl<'a> TxVerifier<'a> {
    pub fn new(tx: &'a Tx, tx_out_map: &'a TxOutMap) -> Self {
        Self {
            tx,
            tx_out_map,
            hash_cache: HashCache::new(),
        }
    }

    /// Run the input script, then the spent output script on its stack
    pub fn verify_input_script(&mut self, n_in: usize) -> Result<(), ValidationError> {
        let index = n_in;
        let input = self
            .tx
            .inputs
            .get(n_in)
            .ok_or(ValidationError::MissingOutput { index })?;
        let tx_out = self
            .tx_out_map
            .get(&input.outpoint())
            .ok_or(ValidationError::MissingOutput { index })?;

        if !input.script.is_push_only() {
            return Err(ValidationError::InputScriptNotPushOnly { index });
        }

        let mut input_interp =
            ScriptInterpreter::from_script_tx(&input.script, self.tx, n_in, &mut self.hash_cache);
        input_interp.eval_script();
        if let Some(error) = input_interp.error() {
            return Err(ValidationError::ScriptFailed { index, error: Some(error) });
        }
        let stack = input_interp.into_stack();

        let mut output_interp = ScriptInterpreter::from_output_script_tx(
            &tx_out.script,
            self.tx,
            n_in,
            stack,
            tx_out.value,
            &mut self.hash_cache,
        );
        if output_interp.eval_script() {
            Ok(())
        } else {
            Err(ValidationError::ScriptFailed {
                index,
                error: output_interp.error(),
            })
        }
    }

    /// No outpoint may be spent twice
    pub fn verify_no_duplicate_inputs(&self) -> Result<(), ValidationError> {
        let mut spent: HashSet<OutPoint> = HashSet::with_capacity(self.tx.inputs.len());
        for (index, input) in self.tx.inputs.iter().enumerate() {
            if !spent.insert(input.outpoint()) {
                return Err(ValidationError::DuplicateInput { index });
            }
        }
        Ok(())
    }

    /// Every input: no outpoint spent twice, known output, script passes
    ///
    /// Duplicates are rejected before any script runs.
    pub fn verify_inputs(&mut self) -> Result<(), ValidationError> {
        self.verify_no_duplicate_inputs()?;
        for index in 0..self.tx.inputs.len() {
            if let Err(err) = self.verify_input_script(index) {
                log::warn!("Rejected input {} of tx {}: {}", index, self.tx.id(), err);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Total input value must cover total output value
    pub fn verify_output_values(&self) -> Result<(), ValidationError> {
        let mut inputs: u64 = 0;
        for (index, input) in self.tx.inputs.iter().enumerate() {
            let tx_out = self
                .tx_out_map
                .get(&input.outpoint())
                .ok_or(ValidationError::MissingOutput { index })?;
            inputs = inputs
                .checked_add(tx_out.value)
                .ok_or(ValidationError::ValueOverflow)?;
        }
        let outputs = self
            .tx
            .total_output_value()
            .ok_or(ValidationError::ValueOverflow)?;

        if inputs < outputs {
            return Err(ValidationError::InsufficientInputValue { inputs, outputs });
        }
        Ok(())
    }

    /// Each spent output must be at least `lock_rel` blocks old at `block_num`
    pub fn verify_lock_rel(&self, block_num: u64) -> Result<(), ValidationError> {
        for (index, input) in self.tx.inputs.iter().enumerate() {
            let entry = self
                .tx_out_map
                .get_with_block_num(&input.outpoint())
                .ok_or(ValidationError::MissingOutput { index })?;
            let unlocked = entry
                .block_num
                .checked_add(u64::from(input.lock_rel))
                .is_some_and(|unlock_at| unlock_at <= block_num);
            if !unlocked {
                return Err(ValidationError::InputLocked {
                    index,
                    lock_rel: input.lock_rel,
                });
            }
        }
        Ok(())
    }

    pub fn verify(&mut self) -> Result<(), ValidationError> {
        if self.tx.inputs.is_empty() || self.tx.outputs.is_empty() {
            return Err(ValidationError::EmptyTransaction);
        }
        self.verify_inputs()?;
        self.verify_output_values()
    }

    pub fn is_valid(&mut self) -> bool {
        self.verify().is_ok()
    }
}

/// Verifies a block's structure and every non-coinbase transaction
///
/// Transactions may spend outputs created earlier in the same block. Those
/// outputs count as created at this block's number for `lock_rel`.
pub struct BlockVerifier<'a> {
    block: &'a Block,
    tx_out_map: &'a TxOutMap,
}

impl<'a> BlockVerifier<'a> {
    pub fn new(block: &'a Block, tx_out_map: &'a TxOutMap) -> Self {
        Self { block, tx_out_map }
    }

    /// Coinbase first and only first
    pub fn verify_structure(&self) -> Result<(), ValidationError> {
        let txs = &self.block.txs;
        let first = txs.first().ok_or(ValidationError::NoTransactions)?;
        if !first.is_coinbase() {
            return Err(ValidationError::MissingCoinbase);
        }
        for (index, tx) in txs.iter().enumerate().skip(1) {
            if tx.is_coinbase() {
                return Err(ValidationError::CoinbaseNotFirst { index });
            }
        }
        Ok(())
    }

    pub fn verify_merkle_root(&self) -> Result<(), ValidationError> {
        let merkle = MerkleTxs::new(&self.block.txs).map_err(|_| ValidationError::NoTransactions)?;
        if merkle.root() != self.block.header.merkle_root {
            return Err(ValidationError::InvalidMerkleRoot);
        }
        Ok(())
    }

    /// Non-coinbase transactions must be final at this block number
    pub fn verify_lock_abs(&self) -> Result<(), ValidationError> {
        let block_num = self.block.header.block_num;
        for (index, tx) in self.block.txs.iter().enumerate().skip(1) {
            if tx.lock_abs > block_num {
                return Err(ValidationError::TxLocked {
                    index,
                    lock_abs: tx.lock_abs,
                });
            }
        }
        Ok(())
    }

    pub fn verify_txs(&self) -> Result<(), ValidationError> {
        let block_num = self.block.header.block_num;
        let mut tx_out_map = self.tx_out_map.clone();
        let mut txs = self.block.txs.iter().enumerate();

        if let Some((_, coinbase)) = txs.next() {
            tx_out_map.add_tx_outputs(coinbase, block_num);
        }
        for (index, tx) in txs {
            let mut verifier = TxVerifier::new(tx, &tx_out_map);
            verifier
                .verify()
                .and_then(|()| verifier.verify_lock_rel(block_num))
                .map_err(|error| ValidationError::InvalidTransaction {
                    index,
                    error: Box::new(error),
                })?;
            for input in &tx.inputs {
                tx_out_map.remove(&input.outpoint());
            }
            tx_out_map.add_tx_outputs(tx, block_num);
        }
        Ok(())
    }

    pub fn verify(&self) -> Result<(), ValidationError> {
        self.verify_structure()?;
        self.verify_merkle_root()?;
        self.verify_lock_abs()?;
        self.verify_txs()
    }

    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Hash256, Header, KeyPair, Script, TxIn, TxOut, TxSignature};

    struct Fixture {
        key: KeyPair,
        funding: Tx,
        tx_out_map: TxOutMap,
    }

    fn fixture(value: u64) -> Fixture {
        let key = KeyPair::generate();
        let funding = Tx::from_coinbase(
            Script::default(),
            TxOut::new(value, Script::from_pkh_output(&key.pkh())),
            0,
        );
        let mut tx_out_map = TxOutMap::new();
        tx_out_map.add_tx_outputs(&funding, 0);
        Fixture {
            key,
            funding,
            tx_out_map,
        }
    }

    fn spend(f: &Fixture, out_value: u64) -> Tx {
        spend_with_lock_rel(f, out_value, 0)
    }

    fn spend_with_lock_rel(f: &Fixture, out_value: u64, lock_rel: u32) -> Tx {
        let input = TxIn::new(f.funding.id(), 0, Script::default(), lock_rel);
        let mut tx = Tx::new(0, vec![input], vec![TxOut::new(out_value, Script::default())], 0);
        let spent = &f.funding.outputs[0];
        let sig = tx
            .sign_no_cache(
                0,
                &f.key.priv_key,
                &spent.script.to_bytes(),
                spent.value,
                TxSignature::SIGHASH_ALL,
            )
            .unwrap();
        tx.inputs[0].script = Script::from_pkh_input(&sig, &f.key.pub_key);
        tx
    }

    #[test]
    fn test_valid_spend() {
        let f = fixture(100);
        let tx = spend(&f, 90);
        let mut verifier = TxVerifier::new(&tx, &f.tx_out_map);
        assert_eq!(verifier.verify(), Ok(()));
        assert!(verifier.is_valid());
    }

    #[test]
    fn test_overspend() {
        let f = fixture(100);
        let tx = spend(&f, 101);
        assert_eq!(
            TxVerifier::new(&tx, &f.tx_out_map).verify(),
            Err(ValidationError::InsufficientInputValue {
                inputs: 100,
                outputs: 101
            })
        );
    }

    #[test]
    fn test_missing_output() {
        let f = fixture(100);
        let tx = spend(&f, 50);
        let empty = TxOutMap::new();
        assert_eq!(
            TxVerifier::new(&tx, &empty).verify(),
            Err(ValidationError::MissingOutput { index: 0 })
        );
    }

    #[test]
    fn test_tampered_output_fails_script() {
        let f = fixture(100);
        let mut tx = spend(&f, 50);
        tx.outputs[0].value = 49;
        let err = TxVerifier::new(&tx, &f.tx_out_map).verify().unwrap_err();
        assert!(matches!(err, ValidationError::ScriptFailed { index: 0, .. }));
    }

    #[test]
    fn test_wrong_key_fails_script() {
        let f = fixture(100);
        let mut tx = spend(&f, 50);
        let other = KeyPair::generate();
        let sig = tx.sign_no_cache(0, &other.priv_key, &[], 100, TxSignature::SIGHASH_ALL).unwrap();
        tx.inputs[0].script = Script::from_pkh_input(&sig, &other.pub_key);
        // pkh mismatch stops at OP_EQUALVERIFY
        assert_eq!(
            TxVerifier::new(&tx, &f.tx_out_map).verify(),
            Err(ValidationError::ScriptFailed {
                index: 0,
                error: Some(ScriptError::VerifyFailed)
            })
        );
    }

    #[test]
    fn test_non_push_input_rejected() {
        let f = fixture(100);
        let mut tx = spend(&f, 50);
        tx.inputs[0].script = "OP_1 OP_DUP".parse().unwrap();
        assert_eq!(
            TxVerifier::new(&tx, &f.tx_out_map).verify(),
            Err(ValidationError::InputScriptNotPushOnly { index: 0 })
        );
    }

    #[test]
    fn test_duplicate_input() {
        let f = fixture(100);
        let mut tx = spend(&f, 50);
        tx.inputs.push(tx.inputs[0].clone());
        assert_eq!(
            TxVerifier::new(&tx, &f.tx_out_map).verify(),
            Err(ValidationError::DuplicateInput { index: 1 })
        );
    }

    #[test]
    fn test_duplicate_input_checked_before_scripts() {
        let f = fixture(100);
        let mut tx = spend(&f, 50);
        // the first input's script fails, but the duplicate is reported
        tx.inputs[0].script = "OP_0".parse().unwrap();
        tx.inputs.push(tx.inputs[0].clone());
        assert_eq!(
            TxVerifier::new(&tx, &f.tx_out_map).verify(),
            Err(ValidationError::DuplicateInput { index: 1 })
        );
    }

    #[test]
    fn test_lock_rel_against_output_age() {
        let f = fixture(100);
        let tx = spend_with_lock_rel(&f, 90, 5);
        let mut verifier = TxVerifier::new(&tx, &f.tx_out_map);
        assert_eq!(verifier.verify(), Ok(()));
        assert_eq!(
            verifier.verify_lock_rel(4),
            Err(ValidationError::InputLocked { index: 0, lock_rel: 5 })
        );
        assert_eq!(verifier.verify_lock_rel(5), Ok(()));

        let mut late = TxOutMap::new();
        late.add_tx_outputs(&f.funding, u64::MAX);
        assert!(TxVerifier::new(&tx, &late).verify_lock_rel(u64::MAX).is_err());
    }

    #[test]
    fn test_empty_transaction() {
        let tx = Tx::new(0, vec![], vec![], 0);
        assert_eq!(
            TxVerifier::new(&tx, &TxOutMap::new()).verify(),
            Err(ValidationError::EmptyTransaction)
        );
    }

    fn block_with(txs: Vec<Tx>, block_num: u64) -> Block {
        let merkle_root = MerkleTxs::new(&txs).map(|m| m.root()).unwrap_or_default();
        let header = Header::new(1, Hash256::zero(), merkle_root, 0, block_num, Hash256::zero());
        Block::new(header, txs)
    }

    #[test]
    fn test_block_spending_own_coinbase() {
        let f = fixture(100);
        let tx = spend(&f, 100);
        let block = block_with(vec![f.funding.clone(), tx], 0);
        // the coinbase output only exists inside the block
        assert_eq!(BlockVerifier::new(&block, &TxOutMap::new()).verify(), Ok(()));
    }

    #[test]
    fn test_block_structure_errors() {
        let f = fixture(100);
        let tx = spend(&f, 100);

        let empty = block_with(vec![], 0);
        assert_eq!(
            BlockVerifier::new(&empty, &TxOutMap::new()).verify(),
            Err(ValidationError::NoTransactions)
        );

        let no_coinbase = block_with(vec![tx.clone()], 0);
        assert_eq!(
            BlockVerifier::new(&no_coinbase, &f.tx_out_map).verify(),
            Err(ValidationError::MissingCoinbase)
        );

        let two_coinbase = block_with(vec![f.funding.clone(), f.funding.clone()], 0);
        assert_eq!(
            BlockVerifier::new(&two_coinbase, &TxOutMap::new()).verify(),
            Err(ValidationError::CoinbaseNotFirst { index: 1 })
        );

        let mut bad_root = block_with(vec![f.funding.clone(), tx], 0);
        bad_root.header.merkle_root = Hash256::alloc(1);
        assert_eq!(
            BlockVerifier::new(&bad_root, &TxOutMap::new()).verify(),
            Err(ValidationError::InvalidMerkleRoot)
        );
    }

    #[test]
    fn test_block_locked_tx() {
        let f = fixture(100);
        let mut tx = spend(&f, 100);
        tx.lock_abs = 5;
        let block = block_with(vec![f.funding.clone(), tx], 4);
        assert_eq!(
            BlockVerifier::new(&block, &TxOutMap::new()).verify(),
            Err(ValidationError::TxLocked { index: 1, lock_abs: 5 })
        );
    }

    #[test]
    fn test_block_lock_rel() {
        let f = fixture(100);
        let tx = spend_with_lock_rel(&f, 100, 5);
        let coinbase = Tx::from_coinbase("0x01".parse().unwrap(), TxOut::new(1, Script::default()), 0);

        let early = block_with(vec![coinbase.clone(), tx.clone()], 4);
        assert_eq!(
            BlockVerifier::new(&early, &f.tx_out_map).verify(),
            Err(ValidationError::InvalidTransaction {
                index: 1,
                error: Box::new(ValidationError::InputLocked { index: 0, lock_rel: 5 })
            })
        );

        let ready = block_with(vec![coinbase, tx], 5);
        assert_eq!(BlockVerifier::new(&ready, &f.tx_out_map).verify(), Ok(()));
    }

    #[test]
    fn test_block_lock_rel_on_same_block_output() {
        let f = fixture(100);
        let tx = spend_with_lock_rel(&f, 100, 1);
        let block = block_with(vec![f.funding.clone(), tx], 7);
        assert_eq!(
            BlockVerifier::new(&block, &TxOutMap::new()).verify(),
            Err(ValidationError::InvalidTransaction {
                index: 1,
                error: Box::new(ValidationError::InputLocked { index: 0, lock_rel: 1 })
            })
        );
    }
}
