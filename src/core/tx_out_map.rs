// In-memory set of spendable outputs

use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use crate::core::{Hash256, Tx, TxOut};

/// Reference to one output of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(tx_id: Hash256, index: u32) -> Self {
        Self { tx_id, index }
    }

    /// Serialize to bytes (txid || index)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(36);
        bytes.extend_from_slice(self.tx_id.as_ref());
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// An unspent output with the number of the block that created it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutBn {
    pub tx_out: TxOut,
    pub block_num: u64,
}

impl TxOutBn {
    pub fn new(tx_out: TxOut, block_num: u64) -> Self {
        Self { tx_out, block_num }
    }
}

/// Outputs available to spend, keyed by outpoint
///
/// Iteration follows insertion order so coin selection is reproducible.
/// Removal leaves an empty slot in the order list; the list is compacted
/// once empty slots outnumber live ones.
#[derive(Debug, Clone, Default)]
pub struct TxOutMap {
    slots: Vec<Option<OutPoint>>,
    map: HashMap<OutPoint, (usize, TxOutBn)>,
}

impl TxOutMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an output; a replaced output keeps its position
    pub fn add(&mut self, outpoint: OutPoint, tx_out: TxOut, block_num: u64) {
        let entry = TxOutBn::new(tx_out, block_num);
        match self.map.get_mut(&outpoint) {
            Some((_, existing)) => *existing = entry,
            None => {
                self.map.insert(outpoint, (self.slots.len(), entry));
                self.slots.push(Some(outpoint));
            }
        }
    }

    /// Add every output of `tx`, created in block `block_num`
    pub fn add_tx_outputs(&mut self, tx: &Tx, block_num: u64) {
        let tx_id = tx.id();
        for (index, tx_out) in tx.outputs.iter().enumerate() {
            self.add(OutPoint::new(tx_id, index as u32), tx_out.clone(), block_num);
        }
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOut> {
        self.get_with_block_num(outpoint).map(|entry| &entry.tx_out)
    }

    pub fn get_with_block_num(&self, outpoint: &OutPoint) -> Option<&TxOutBn> {
        self.map.get(outpoint).map(|(_, entry)| entry)
    }

    /// Remove a spent output
    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<TxOut> {
        let (slot, entry) = self.map.remove(outpoint)?;
        self.slots[slot] = None;
        if self.slots.len() > 2 * self.map.len() {
            self.compact();
        }
        Some(entry.tx_out)
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        for (slot, outpoint) in self.slots.iter().flatten().enumerate() {
            if let Some((index, _)) = self.map.get_mut(outpoint) {
                *index = slot;
            }
        }
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.map.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOut)> {
        self.slots.iter().flatten().filter_map(move |outpoint| {
            self.map
                .get(outpoint)
                .map(|(_, entry)| (outpoint, &entry.tx_out))
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &TxOut> {
        self.iter().map(|(_, tx_out)| tx_out)
    }
}
