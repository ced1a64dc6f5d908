// Core data structures and canonical encodings

mod types;
mod hash;
pub mod encoding;
pub mod serialize;
pub mod opcode;
mod script_num;
mod keys;
pub mod signature;
mod tx_signature;
pub mod script;
mod transaction;
mod tx_out_map;
mod block;

pub use types::*;
pub use hash::*;
pub use encoding::{decode_hex, decode_iso_str, encode_hex, encode_iso_str, is_valid_hex};
pub use serialize::Serializable;
pub use opcode::Opcode;
pub use script_num::ScriptNum;
pub use keys::*;
pub use signature::{sign, verify, CompactSig, SignedMessage};
pub use tx_signature::TxSignature;
pub use script::{Script, ScriptChunk};
pub use transaction::*;
pub use tx_out_map::{OutPoint, TxOutBn, TxOutMap};
pub use block::*;
