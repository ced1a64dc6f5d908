// Transaction signatures as they appear on the script stack

use crate::core::signature::CompactSig;
use crate::core::FixedBuf;
use crate::error::{EbxError, Result};

/// Signature hash type byte followed by a compact ECDSA signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxSignature {
    pub hash_type: u8,
    pub sig: CompactSig,
}

impl TxSignature {
    pub const SIZE: usize = 65;

    pub const SIGHASH_ALL: u8 = 0x01;
    pub const SIGHASH_NONE: u8 = 0x02;
    pub const SIGHASH_SINGLE: u8 = 0x03;
    pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

    pub fn new(hash_type: u8, sig: CompactSig) -> Self {
        Self { hash_type, sig }
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.hash_type;
        bytes[1..].copy_from_slice(self.sig.as_ref());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(EbxError::InvalidSize {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            hash_type: bytes[0],
            sig: FixedBuf::from_slice(&bytes[1..])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let sig = TxSignature::new(TxSignature::SIGHASH_ALL, FixedBuf::alloc(7));
        let bytes = sig.to_bytes();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(&bytes[1..], &[7u8; 64][..]);
        assert_eq!(TxSignature::from_bytes(&bytes).unwrap(), sig);
    }

    #[test]
    fn test_wrong_length() {
        assert!(matches!(
            TxSignature::from_bytes(&[1u8; 64]),
            Err(EbxError::InvalidSize { expected: 65, actual: 64 })
        ));
    }
}
