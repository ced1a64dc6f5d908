// Fixed-length byte buffers

use std::fmt;
use std::ops::Deref;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::core::encoding::{decode_hex, encode_hex};
use crate::error::{EbxError, Result};

/// Byte buffer whose length is part of its type.
///
/// Hashes, keys and signatures are all `FixedBuf`s of a specific size. The
/// length is checked once at construction and never changes afterwards.
/// Ordering is lexicographic, which equals big-endian numeric order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedBuf<const N: usize>([u8; N]);

/// 256-bit digest: transaction ids, block ids, Merkle nodes, sighashes
pub type Hash256 = FixedBuf<32>;

impl<const N: usize> FixedBuf<N> {
    /// Size of this buffer in bytes
    pub const SIZE: usize = N;

    /// Wrap an array of the right size
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Copy a slice, failing unless it is exactly `N` bytes long
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; N] = slice.try_into().map_err(|_| EbxError::InvalidSize {
            expected: N,
            actual: slice.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Buffer of `N` copies of `fill`
    pub fn alloc(fill: u8) -> Self {
        Self([fill; N])
    }

    /// All-zero buffer
    pub fn zero() -> Self {
        Self::alloc(0)
    }

    /// Decode strict lowercase hex of exactly `2 * N` characters
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = decode_hex(hex_str)?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn into_inner(self) -> [u8; N] {
        self.0
    }
}

impl<const N: usize> Default for FixedBuf<N> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const N: usize> Deref for FixedBuf<N> {
    type Target = [u8; N];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize> AsRef<[u8]> for FixedBuf<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> From<[u8; N]> for FixedBuf<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> TryFrom<&[u8]> for FixedBuf<N> {
    type Error = EbxError;

    fn try_from(slice: &[u8]) -> Result<Self> {
        Self::from_slice(slice)
    }
}

impl<const N: usize> fmt::Debug for FixedBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedBuf<{}>({})", N, self.to_hex())
    }
}

impl<const N: usize> fmt::Display for FixedBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl<const N: usize> Serialize for FixedBuf<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de, const N: usize> Deserialize<'de> for FixedBuf<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        Self::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}
