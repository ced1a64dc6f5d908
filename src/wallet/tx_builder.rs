// Transaction builder

use crate::core::{Script, Tx, TxIn, TxOut, TxOutMap};
use crate::error::{EbxError, Result};

/// Builds an unsigned transaction funded from a [`TxOutMap`]
///
/// Inputs are taken in the map's insertion order until the outputs are
/// covered. Any remainder goes to a change output; no change output is
/// added when the inputs match the outputs exactly.
pub struct TxBuilder<'a> {
    tx_out_map: &'a TxOutMap,
    change_script: Script,
    outputs: Vec<TxOut>,
    lock_abs: u64,
}

impl<'a> TxBuilder<'a> {
    pub fn new(tx_out_map: &'a TxOutMap, change_script: Script) -> Self {
        Self {
            tx_out_map,
            change_script,
            outputs: Vec::new(),
            lock_abs: 0,
        }
    }

    pub fn add_output(&mut self, value: u64, script: Script) -> &mut Self {
        self.outputs.push(TxOut::new(value, script));
        self
    }

    pub fn set_lock_abs(&mut self, lock_abs: u64) -> &mut Self {
        self.lock_abs = lock_abs;
        self
    }

    pub fn build(&self) -> Result<Tx> {
        let need = self
            .outputs
            .iter()
            .try_fold(0u64, |total, out| total.checked_add(out.value))
            .ok_or(EbxError::ValueOverflow)?;

        let mut inputs = Vec::new();
        let mut have = 0u64;
        for (outpoint, tx_out) in self.tx_out_map.iter() {
            if have >= need && !inputs.is_empty() {
                break;
            }
            inputs.push(TxIn::new(outpoint.tx_id, outpoint.index, Script::default(), 0));
            have = have.checked_add(tx_out.value).ok_or(EbxError::ValueOverflow)?;
        }

        if have < need || inputs.is_empty() {
            return Err(EbxError::InsufficientFunds { have, need });
        }

        let mut outputs = self.outputs.clone();
        let change = have - need;
        if change > 0 {
            outputs.push(TxOut::new(change, self.change_script.clone()));
        }

        log::debug!(
            "Built tx: {} inputs, {} outputs, change {}",
            inputs.len(),
            outputs.len(),
            change
        );
        Ok(Tx::new(Tx::VERSION, inputs, outputs, self.lock_abs))
    }
}
