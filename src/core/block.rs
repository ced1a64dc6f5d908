// Block data structures

use std::io::Read;
use serde::{Deserialize, Serialize};
use crate::consensus::MerkleTxs;
use crate::core::serialize::{read_fixed, read_u32, read_u64, read_varint, write_varint, Serializable};
use crate::core::{double_blake3_hash, Hash256, Tx};
use crate::error::Result;

/// Block header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    /// Id of the previous block
    pub prev_block_id: Hash256,
    /// Merkle root of all transactions in the block
    pub merkle_root: Hash256,
    /// Unix time in milliseconds
    pub timestamp: u64,
    pub block_num: u64,
    pub target: Hash256,
    /// Varied by the header search
    pub nonce: Hash256,
    pub work_ser_algo: u32,
    pub work_ser_hash: Hash256,
    pub work_par_algo: u32,
    pub work_par_hash: Hash256,
}

impl Header {
    /// Encoded size in bytes
    pub const SIZE: usize = 4 + 32 + 32 + 8 + 8 + 32 + 32 + 4 + 32 + 4 + 32;

    /// Header with the given chain position and zeroed proof fields
    pub fn new(
        version: u32,
        prev_block_id: Hash256,
        merkle_root: Hash256,
        timestamp: u64,
        block_num: u64,
        target: Hash256,
    ) -> Self {
        Self {
            version,
            prev_block_id,
            merkle_root,
            timestamp,
            block_num,
            target,
            nonce: Hash256::zero(),
            work_ser_algo: 0,
            work_ser_hash: Hash256::zero(),
            work_par_algo: 0,
            work_par_hash: Hash256::zero(),
        }
    }

    /// Block id: double BLAKE3 of the canonical bytes
    pub fn id(&self) -> Hash256 {
        double_blake3_hash(&self.to_bytes())
    }
}

impl Serializable for Header {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.reserve(Self::SIZE);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.prev_block_id.as_ref());
        buf.extend_from_slice(self.merkle_root.as_ref());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.block_num.to_le_bytes());
        buf.extend_from_slice(self.target.as_ref());
        buf.extend_from_slice(self.nonce.as_ref());
        buf.extend_from_slice(&self.work_ser_algo.to_le_bytes());
        buf.extend_from_slice(self.work_ser_hash.as_ref());
        buf.extend_from_slice(&self.work_par_algo.to_le_bytes());
        buf.extend_from_slice(self.work_par_hash.as_ref());
    }

    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            version: read_u32(reader)?,
            prev_block_id: read_fixed(reader)?,
            merkle_root: read_fixed(reader)?,
            timestamp: read_u64(reader)?,
            block_num: read_u64(reader)?,
            target: read_fixed(reader)?,
            nonce: read_fixed(reader)?,
            work_ser_algo: read_u32(reader)?,
            work_ser_hash: read_fixed(reader)?,
            work_par_algo: read_u32(reader)?,
            work_par_hash: read_fixed(reader)?,
        })
    }
}

/// Block - contains header and transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub txs: Vec<Tx>,
}

impl Block {
    pub fn new(header: Header, txs: Vec<Tx>) -> Self {
        Self { header, txs }
    }

    pub fn id(&self) -> Hash256 {
        self.header.id()
    }

    /// Whether the header commits to exactly this transaction list
    pub fn is_merkle_root_valid(&self) -> bool {
        match MerkleTxs::new(&self.txs) {
            Ok(merkle) => merkle.root() == self.header.merkle_root,
            Err(_) => false,
        }
    }
}

impl Serializable for Block {
    fn write_to(&self, buf: &mut Vec<u8>) {
        self.header.write_to(buf);
        write_varint(buf, self.txs.len() as u64);
        for tx in &self.txs {
            tx.write_to(buf);
        }
    }

    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let header = Header::read_from(reader)?;
        let tx_count = read_varint(reader)?;
        let mut txs = Vec::new();
        for _ in 0..tx_count {
            txs.push(Tx::read_from(reader)?);
        }
        Ok(Self { header, txs })
    }
}
