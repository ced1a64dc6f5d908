// EarthBucks-style ledger core
// Canonical encodings, script interpreter, transactions and header search

pub mod error;
pub mod core;
pub mod consensus;
pub mod wallet;

// Re-exports for convenience
pub use crate::error::{EbxError, Result, ScriptError};
pub use crate::core::{Block, Hash256, Header, KeyPair, Pkh, PrivKey, PubKey, Script, Tx, TxIn, TxOut, TxOutMap};
pub use crate::consensus::{BlockVerifier, HeaderMine, MerkleTxs, ScriptInterpreter, TxVerifier, ValidationError};
pub use crate::wallet::{PkhKeyMap, TxBuilder, TxSigner};
