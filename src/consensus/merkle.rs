// Merkle commitment over a block's transactions

use crate::core::{double_blake3_hash, Hash256, Tx};
use crate::error::{EbxError, Result};

/// Hash of an internal node: `double_blake3(left || right)`
fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left.as_ref());
    combined[32..].copy_from_slice(right.as_ref());
    double_blake3_hash(&combined)
}

/// Node of a binary Merkle tree
///
/// Leaves carry a transaction id. Levels are paired left to right; an odd
/// node at the end of a level moves up unchanged instead of being paired
/// with a copy of itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleNode {
    pub hash: Hash256,
    pub left: Option<Box<MerkleNode>>,
    pub right: Option<Box<MerkleNode>>,
}

impl MerkleNode {
    pub fn leaf(hash: Hash256) -> Self {
        Self {
            hash,
            left: None,
            right: None,
        }
    }

    pub fn from_children(left: MerkleNode, right: MerkleNode) -> Self {
        Self {
            hash: hash_pair(&left.hash, &right.hash),
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    /// Build the tree bottom-up; `None` when there are no leaves
    pub fn from_leaves(leaves: &[Hash256]) -> Option<Self> {
        let mut level: Vec<MerkleNode> = leaves.iter().map(|h| MerkleNode::leaf(*h)).collect();

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            let mut nodes = level.into_iter();
            while let Some(left) = nodes.next() {
                match nodes.next() {
                    Some(right) => next.push(MerkleNode::from_children(left, right)),
                    None => next.push(left),
                }
            }
            level = next;
        }

        level.pop()
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn leaf_count(&self) -> usize {
        match (&self.left, &self.right) {
            (None, None) => 1,
            (left, right) => {
                left.as_ref().map_or(0, |n| n.leaf_count()) + right.as_ref().map_or(0, |n| n.leaf_count())
            }
        }
    }
}

/// Sibling hash on the path from a leaf to the root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Hash256,
    /// The sibling sits on the left of the running hash
    pub sibling_is_left: bool,
}

/// Inclusion proof for one transaction id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub index: usize,
    pub path: Vec<ProofStep>,
}

impl MerkleProof {
    /// Recompute the root from `leaf` and compare with `root`
    pub fn verify(&self, leaf: &Hash256, root: &Hash256) -> bool {
        let computed = self.path.iter().fold(*leaf, |acc, step| {
            if step.sibling_is_left {
                hash_pair(&step.sibling, &acc)
            } else {
                hash_pair(&acc, &step.sibling)
            }
        });
        computed == *root
    }
}

/// Merkle tree over the ids of an ordered transaction list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTxs {
    tx_ids: Vec<Hash256>,
    root: MerkleNode,
}

impl MerkleTxs {
    pub fn new(txs: &[Tx]) -> Result<Self> {
        Self::from_tx_ids(txs.iter().map(Tx::id).collect())
    }

    pub fn from_tx_ids(tx_ids: Vec<Hash256>) -> Result<Self> {
        let root = MerkleNode::from_leaves(&tx_ids).ok_or(EbxError::EmptyMerkleTree)?;
        Ok(Self { tx_ids, root })
    }

    pub fn root(&self) -> Hash256 {
        self.root.hash
    }

    pub fn tree(&self) -> &MerkleNode {
        &self.root
    }

    pub fn tx_ids(&self) -> &[Hash256] {
        &self.tx_ids
    }

    /// Rebuild from the stored ids and compare with the stored root
    pub fn verify(&self) -> bool {
        MerkleNode::from_leaves(&self.tx_ids).is_some_and(|node| node.hash == self.root.hash)
    }

    /// Inclusion proof for the transaction at `index`
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.tx_ids.len() {
            return None;
        }

        let mut path = Vec::new();
        let mut level = self.tx_ids.clone();
        let mut pos = index;
        while level.len() > 1 {
            if pos % 2 == 1 {
                path.push(ProofStep {
                    sibling: level[pos - 1],
                    sibling_is_left: true,
                });
            } else if pos + 1 < level.len() {
                path.push(ProofStep {
                    sibling: level[pos + 1],
                    sibling_is_left: false,
                });
            }
            // a lone last node adds no step

            level = level
                .chunks(2)
                .map(|pair| match pair.get(1) {
                    Some(right) => hash_pair(&pair[0], right),
                    None => pair[0],
                })
                .collect();
            pos /= 2;
        }

        Some(MerkleProof { index, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Script, TxOut};

    fn ids(n: usize) -> Vec<Hash256> {
        (0..n).map(|i| double_blake3_hash(&(i as u64).to_le_bytes())).collect()
    }

    #[test]
    fn test_empty() {
        assert!(MerkleNode::from_leaves(&[]).is_none());
        assert_eq!(MerkleTxs::new(&[]), Err(EbxError::EmptyMerkleTree));
    }

    #[test]
    fn test_single_leaf_is_root() {
        let leaves = ids(1);
        let node = MerkleNode::from_leaves(&leaves).unwrap();
        assert_eq!(node.hash, leaves[0]);
        assert!(node.is_leaf());
    }

    #[test]
    fn test_two_and_three_leaves() {
        let l = ids(3);
        let two = MerkleNode::from_leaves(&l[..2]).unwrap();
        assert_eq!(two.hash, hash_pair(&l[0], &l[1]));

        // the third leaf is carried up, not duplicated
        let three = MerkleNode::from_leaves(&l).unwrap();
        assert_eq!(three.hash, hash_pair(&hash_pair(&l[0], &l[1]), &l[2]));
        assert_eq!(three.leaf_count(), 3);
    }

    #[test]
    fn test_verify_all_sizes() {
        for n in 1..=17 {
            let merkle = MerkleTxs::from_tx_ids(ids(n)).unwrap();
            assert!(merkle.verify(), "size {}", n);
            assert_eq!(merkle.tree().leaf_count(), n);
        }
    }

    #[test]
    fn test_mutated_leaf_changes_root() {
        for n in 1..=9 {
            let leaves = ids(n);
            let root = MerkleTxs::from_tx_ids(leaves.clone()).unwrap().root();
            for i in 0..n {
                let mut mutated = leaves.clone();
                mutated[i] = Hash256::alloc(0xee);
                assert_ne!(MerkleTxs::from_tx_ids(mutated).unwrap().root(), root);
            }
        }
    }

    #[test]
    fn test_from_txs() {
        let txs: Vec<Tx> = (0..3)
            .map(|i| Tx::new(0, vec![], vec![TxOut::new(i, Script::default())], 0))
            .collect();
        let merkle = MerkleTxs::new(&txs).unwrap();
        assert!(merkle.verify());
        assert_eq!(merkle.tx_ids()[1], txs[1].id());
    }

    #[test]
    fn test_proofs() {
        for n in 1..=12 {
            let leaves = ids(n);
            let merkle = MerkleTxs::from_tx_ids(leaves.clone()).unwrap();
            let root = merkle.root();
            for (i, leaf) in leaves.iter().enumerate() {
                let proof = merkle.proof(i).unwrap();
                assert!(proof.verify(leaf, &root), "size {} index {}", n, i);
                assert!(!proof.verify(&Hash256::alloc(0xee), &root));
            }
            assert!(merkle.proof(n).is_none());
        }
    }
}
