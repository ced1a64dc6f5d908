// Hashing utilities

use crate::core::Hash256;

/// Single BLAKE3 hash
pub fn blake3_hash(data: &[u8]) -> Hash256 {
    Hash256::new(*blake3::hash(data).as_bytes())
}

/// BLAKE3 applied twice: ids, public-key hashes and sighashes
/// double_blake3 = BLAKE3(BLAKE3(data))
pub fn double_blake3_hash(data: &[u8]) -> Hash256 {
    let first = blake3_hash(data);
    blake3_hash(first.as_bytes())
}

/// Keyed BLAKE3, used to bind a message to a domain key
pub fn blake3_mac(key: &Hash256, data: &[u8]) -> Hash256 {
    Hash256::new(*blake3::keyed_hash(key.as_bytes(), data).as_bytes())
}
