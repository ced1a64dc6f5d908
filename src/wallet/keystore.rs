// Key management

use std::collections::HashMap;
use crate::core::{KeyPair, Pkh};

/// Keys indexed by public-key hash, used to sign pay-to-PKH inputs
#[derive(Debug, Clone, Default)]
pub struct PkhKeyMap {
    keys: HashMap<Pkh, KeyPair>,
}

impl PkhKeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a key pair under its own PKH, returning the PKH
    pub fn add(&mut self, key_pair: KeyPair) -> Pkh {
        let pkh = key_pair.pkh();
        self.keys.insert(pkh, key_pair);
        pkh
    }

    /// Generate a new key pair and store it
    pub fn new_key(&mut self) -> Pkh {
        self.add(KeyPair::generate())
    }

    pub fn get(&self, pkh: &Pkh) -> Option<&KeyPair> {
        self.keys.get(pkh)
    }

    pub fn remove(&mut self, pkh: &Pkh) -> Option<KeyPair> {
        self.keys.remove(pkh)
    }

    pub fn contains(&self, pkh: &Pkh) -> bool {
        self.keys.contains_key(pkh)
    }

    pub fn pkhs(&self) -> impl Iterator<Item = &Pkh> {
        self.keys.keys()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
