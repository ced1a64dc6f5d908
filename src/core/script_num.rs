// Arbitrary-precision script integers

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Integer operand of the arithmetic opcodes
///
/// Encoded as minimal big-endian two's complement: the top bit of the first
/// byte is the sign, and zero is the empty byte string. Magnitude is
/// unbounded so arithmetic never wraps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScriptNum {
    pub num: BigInt,
}

impl ScriptNum {
    /// Largest shift amount accepted by `OP_LSHIFT`/`OP_RSHIFT`
    pub const MAX_SHIFT: u64 = 1 << 16;

    pub fn new(num: BigInt) -> Self {
        Self { num }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            num: BigInt::from_signed_bytes_be(bytes),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        if self.num.is_zero() {
            return Vec::new();
        }
        self.num.to_signed_bytes_be()
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.num.is_negative()
    }

    /// Value as `usize` if it is non-negative and fits
    pub fn to_usize(&self) -> Option<usize> {
        self.num.to_usize()
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.num.to_u64()
    }
}

impl From<i64> for ScriptNum {
    fn from(n: i64) -> Self {
        Self { num: BigInt::from(n) }
    }
}

impl From<u64> for ScriptNum {
    fn from(n: u64) -> Self {
        Self { num: BigInt::from(n) }
    }
}

impl From<usize> for ScriptNum {
    fn from(n: usize) -> Self {
        Self { num: BigInt::from(n) }
    }
}

impl From<BigInt> for ScriptNum {
    fn from(num: BigInt) -> Self {
        Self { num }
    }
}
