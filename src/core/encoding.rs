// Strict hex and checksummed canonical strings

use crate::core::{blake3_hash, FixedBuf};
use crate::error::{EbxError, Result};

/// Length of the hex-encoded checksum that follows the prefix
const CHECKSUM_HEX_LEN: usize = 8;

/// Canonical hex is lowercase, even-length, `[0-9a-f]*`
pub fn is_valid_hex(hex_str: &str) -> bool {
    hex_str.len() % 2 == 0 && hex_str.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode canonical hex; anything else is `InvalidHex`
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>> {
    if !is_valid_hex(hex_str) {
        return Err(EbxError::InvalidHex);
    }
    hex::decode(hex_str).map_err(|_| EbxError::InvalidHex)
}

/// Encode a buffer as `prefix ++ hex(checksum) ++ base58(payload)`
///
/// The checksum is the first four bytes of BLAKE3 over the payload.
pub fn encode_iso_str(prefix: &str, payload: &[u8]) -> String {
    let check = blake3_hash(payload);
    let mut out = String::with_capacity(prefix.len() + CHECKSUM_HEX_LEN + payload.len() * 2);
    out.push_str(prefix);
    out.push_str(&encode_hex(&check[..4]));
    out.push_str(&bs58::encode(payload).into_string());
    out
}

/// Decode a canonical string produced by [`encode_iso_str`]
///
/// The checksum is compared before the payload size so a corrupted payload
/// is reported as `InvalidChecksum` even when its length also changed.
pub fn decode_iso_str<const N: usize>(prefix: &str, s: &str) -> Result<FixedBuf<N>> {
    let rest = s.strip_prefix(prefix).ok_or(EbxError::InvalidFormat)?;
    if rest.len() < CHECKSUM_HEX_LEN || !rest.is_char_boundary(CHECKSUM_HEX_LEN) {
        return Err(EbxError::InvalidFormat);
    }
    let (check_hex, payload_str) = rest.split_at(CHECKSUM_HEX_LEN);
    let check = decode_hex(check_hex)?;
    let payload = bs58::decode(payload_str)
        .into_vec()
        .map_err(|_| EbxError::InvalidBase58)?;

    let expected = blake3_hash(&payload);
    if expected[..4] != check[..] {
        return Err(EbxError::InvalidChecksum);
    }
    FixedBuf::from_slice(&payload)
}
