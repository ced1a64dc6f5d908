// Consensus and validation logic

pub mod interpreter;
pub mod merkle;
pub mod header_mine;
pub mod validation;

pub use interpreter::{cast_to_bool, ScriptInterpreter};
pub use merkle::{MerkleNode, MerkleProof, MerkleTxs, ProofStep};
pub use header_mine::{nonce_add, HeaderMine, MineResult};
pub use validation::{BlockVerifier, TxVerifier, ValidationError};
