// Error types for encodings, scripts and the interpreter

use thiserror::Error;

/// Errors raised by the buffer, encoding, script and transaction layers.
///
/// These cover malformed input, which is an expected case and never a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EbxError {
    #[error("invalid size: expected {expected}, got {actual}")]
    InvalidSize { expected: usize, actual: usize },

    #[error("invalid format")]
    InvalidFormat,

    #[error("invalid hex")]
    InvalidHex,

    #[error("invalid base58")]
    InvalidBase58,

    #[error("invalid checksum")]
    InvalidChecksum,

    #[error("malformed script: {0}")]
    MalformedScript(String),

    #[error("invalid opcode: {0}")]
    InvalidOpcode(String),

    #[error("not enough data")]
    NotEnoughData,

    #[error("non-minimal encoding")]
    NonMinimalEncoding,

    #[error("trailing data after value")]
    TrailingData,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("cannot build a merkle tree without leaves")]
    EmptyMerkleTree,

    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("value sum does not fit in 64 bits")]
    ValueOverflow,

    #[error("spent output not found")]
    MissingOutput,

    #[error("no key for public key hash")]
    MissingKey,

    #[error("input index {0} out of range")]
    InputOutOfRange(usize),
}

pub type Result<T> = std::result::Result<T, EbxError>;

/// Reasons the script interpreter halts.
///
/// The interpreter records one of these and stops; it never propagates it
/// out of `eval_script`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptError {
    #[error("invalid stack operation")]
    InvalidStackOperation,

    #[error("unbalanced conditional")]
    UnbalancedConditional,

    #[error("verify failed")]
    VerifyFailed,

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid shift")]
    InvalidShift,

    #[error("invalid public key length")]
    InvalidPublicKeyLength,

    #[error("invalid signature length")]
    InvalidSignatureLength,

    #[error("invalid number of keys")]
    InvalidKeyCount,

    #[error("invalid number of signatures")]
    InvalidSigCount,

    #[error("lock time requirement not met")]
    LockNotSatisfied,

    #[error("invalid opcode")]
    InvalidOpcode,
}
