// ECDSA over 32-byte digests and the signed-message primitive

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, Secp256k1};
use crate::core::{blake3_hash, blake3_mac, FixedBuf, Hash256, PrivKey, PubKey};
use crate::error::{EbxError, Result};

/// Compact `r || s` ECDSA signature
pub type CompactSig = FixedBuf<64>;

/// Sign a digest with a private key
pub fn sign(digest: &Hash256, priv_key: &PrivKey) -> Result<CompactSig> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(digest.into_inner());
    let sig = secp.sign_ecdsa(&message, &priv_key.secret_key()?);
    Ok(FixedBuf::new(sig.serialize_compact()))
}

/// Check a compact signature over a digest; malformed input is simply `false`
pub fn verify(digest: &Hash256, pub_key: &PubKey, sig: &CompactSig) -> bool {
    let secp = Secp256k1::verification_only();
    let Ok(public_key) = pub_key.public_key() else {
        return false;
    };
    let Ok(signature) = Signature::from_compact(sig.as_ref()) else {
        return false;
    };
    let message = Message::from_digest(digest.into_inner());
    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}

/// Message authenticated by a key pair under a purpose string
///
/// The mac binds the message to `key_str` so a signature made for one
/// purpose can't be replayed for another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub sig: CompactSig,
    pub pub_key: PubKey,
    pub mac: Hash256,
    pub message: Vec<u8>,
}

impl SignedMessage {
    const HEADER_SIZE: usize = 64 + PubKey::SIZE + 32;

    fn create_mac(message: &[u8], key_str: &str) -> Hash256 {
        let key = blake3_hash(key_str.as_bytes());
        blake3_mac(&key, message)
    }

    pub fn from_sign_message(priv_key: &PrivKey, message: &[u8], key_str: &str) -> Result<Self> {
        let mac = Self::create_mac(message, key_str);
        let sig = sign(&mac, priv_key)?;
        Ok(Self {
            sig,
            pub_key: priv_key.to_pub_key()?,
            mac,
            message: message.to_vec(),
        })
    }

    pub fn is_valid(&self, key_str: &str) -> bool {
        let mac = Self::create_mac(&self.message, key_str);
        mac == self.mac && verify(&mac, &self.pub_key, &self.sig)
    }

    /// `sig || pub_key || mac || message`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_SIZE + self.message.len());
        buf.extend_from_slice(self.sig.as_ref());
        buf.extend_from_slice(self.pub_key.as_ref());
        buf.extend_from_slice(self.mac.as_ref());
        buf.extend_from_slice(&self.message);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::HEADER_SIZE {
            return Err(EbxError::NotEnoughData);
        }
        let (sig, rest) = bytes.split_at(64);
        let (pub_key, rest) = rest.split_at(PubKey::SIZE);
        let (mac, message) = rest.split_at(32);
        Ok(Self {
            sig: FixedBuf::from_slice(sig)?,
            pub_key: PubKey::from_slice(pub_key)?,
            mac: FixedBuf::from_slice(mac)?,
            message: message.to_vec(),
        })
    }
}
