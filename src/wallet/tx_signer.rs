// Signing of pay-to-PKH inputs

use crate::core::{HashCache, Script, Tx, TxOutMap, TxSignature};
use crate::error::{EbxError, Result};
use crate::wallet::PkhKeyMap;

/// Signs the inputs of a transaction that spend pay-to-PKH outputs
///
/// Input scripts are outside the sighash, so one cache serves every input.
pub struct TxSigner<'a> {
    tx: Tx,
    tx_out_map: &'a TxOutMap,
    pkh_key_map: &'a PkhKeyMap,
    hash_cache: HashCache,
}

impl<'a> TxSigner<'a> {
    pub fn new(tx: Tx, tx_out_map: &'a TxOutMap, pkh_key_map: &'a PkhKeyMap) -> Self {
        Self {
            tx,
            tx_out_map,
            pkh_key_map,
            hash_cache: HashCache::new(),
        }
    }

    /// Replace the script of input `n_in` with `<sig> <pubkey>`
    pub fn sign(&mut self, n_in: usize) -> Result<()> {
        let input = self.tx.inputs.get(n_in).ok_or(EbxError::InputOutOfRange(n_in))?;
        let tx_out = self
            .tx_out_map
            .get(&input.outpoint())
            .ok_or(EbxError::MissingOutput)?;
        let pkh = tx_out.script.pkh_output_hash().ok_or(EbxError::MissingKey)?;
        let key_pair = self.pkh_key_map.get(&pkh).ok_or(EbxError::MissingKey)?;

        let sig = self.tx.sign_with_cache(
            n_in,
            &key_pair.priv_key,
            &tx_out.script.to_bytes(),
            tx_out.value,
            TxSignature::SIGHASH_ALL,
            &mut self.hash_cache,
        )?;
        self.tx.inputs[n_in].script = Script::from_pkh_input(&sig, &key_pair.pub_key);
        Ok(())
    }

    pub fn sign_all(&mut self) -> Result<()> {
        for n_in in 0..self.tx.inputs.len() {
            self.sign(n_in)?;
        }
        Ok(())
    }

    pub fn tx(&self) -> &Tx {
        &self.tx
    }

    pub fn into_tx(self) -> Tx {
        self.tx
    }
}
