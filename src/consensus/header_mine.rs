// Header search: keep the lowest id over a bounded number of nonces

use std::time::Instant;
use crate::core::{double_blake3_hash, Hash256, Header, Serializable};

/// Byte offset of the nonce in the canonical header encoding
const NONCE_OFFSET: usize = 4 + 32 + 32 + 8 + 8 + 32;

/// `start + i` as a 256-bit big-endian integer, wrapping on overflow
pub fn nonce_add(start: &Hash256, i: u64) -> Hash256 {
    let mut bytes = start.into_inner();
    let mut carry = i as u128;
    for byte in bytes.iter_mut().rev() {
        if carry == 0 {
            break;
        }
        let sum = *byte as u128 + (carry & 0xff);
        *byte = sum as u8;
        carry = (carry >> 8) + (sum >> 8);
    }
    Hash256::new(bytes)
}

/// Best trial found by a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MineResult {
    /// Nonce that produced `id`
    pub nonce: Hash256,
    /// Lowest header id seen
    pub id: Hash256,
    /// Number of headers evaluated
    pub trials: u64,
}

/// Searches nonces of a fixed header for the numerically lowest id
///
/// Trial `i` uses `header.nonce + i`. The header itself is never modified;
/// callers apply the winning nonce with [`HeaderMine::header_with_nonce`].
pub struct HeaderMine {
    header: Header,
    /// Canonical bytes of `header`, patched per trial
    template: Vec<u8>,
}

impl HeaderMine {
    pub fn new(header: Header) -> Self {
        let template = header.to_bytes();
        Self { header, template }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Copy of the header with `nonce` applied
    pub fn header_with_nonce(&self, nonce: Hash256) -> Header {
        let mut header = self.header.clone();
        header.nonce = nonce;
        header
    }

    /// Id and nonce of trial `i`
    fn trial(&self, i: u64) -> (Hash256, Hash256) {
        let nonce = nonce_add(&self.header.nonce, i);
        let mut bytes = self.template.clone();
        bytes[NONCE_OFFSET..NONCE_OFFSET + 32].copy_from_slice(nonce.as_ref());
        (double_blake3_hash(&bytes), nonce)
    }

    /// Evaluate `n` nonces (at least one) and keep the lowest id
    ///
    /// Ties keep the earliest trial, so the result depends only on the
    /// header and `n`.
    pub fn get_lowest_for_n_times(&self, n: u64) -> MineResult {
        let trials = n.max(1);
        let start_time = Instant::now();
        log::debug!("Header search: {} trials from block {}", trials, self.header.block_num);

        let result = self.search(trials);

        let elapsed = start_time.elapsed();
        log::debug!(
            "Header search done: lowest id {} ({:.1} KH/s)",
            result.id,
            trials as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1000.0
        );
        result
    }

    #[cfg(not(feature = "parallel"))]
    fn search(&self, trials: u64) -> MineResult {
        let (id, nonce) = self.trial(0);
        let mut best = MineResult { nonce, id, trials };

        for i in 1..trials {
            let (id, nonce) = self.trial(i);
            if id < best.id {
                best.id = id;
                best.nonce = nonce;
            }

            // Progress indicator every 100k trials
            if i % 100_000 == 0 {
                log::trace!("Header search trials: {}", i);
            }
        }
        best
    }

    #[cfg(feature = "parallel")]
    fn search(&self, trials: u64) -> MineResult {
        use rayon::prelude::*;

        // (id, trial) is unique, so the minimum is independent of sharding
        let (id, _, nonce) = (0..trials)
            .into_par_iter()
            .map(|i| {
                let (id, nonce) = self.trial(i);
                (id, i, nonce)
            })
            .min_by_key(|(id, i, _)| (*id, *i))
            .unwrap_or_else(|| {
                let (id, nonce) = self.trial(0);
                (id, 0, nonce)
            });
        MineResult { nonce, id, trials }
    }

    pub fn get_lowest_id_for_n_times(&self, n: u64) -> Hash256 {
        self.get_lowest_for_n_times(n).id
    }

    pub fn get_lowest_nonce_for_n_times(&self, n: u64) -> Hash256 {
        self.get_lowest_for_n_times(n).nonce
    }
}
