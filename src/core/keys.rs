// Private keys, public keys and public-key hashes

use std::fmt;
use std::str::FromStr;
use rand::rngs::OsRng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use crate::core::encoding::{decode_iso_str, encode_iso_str};
use crate::core::{double_blake3_hash, FixedBuf};
use crate::error::{EbxError, Result};

/// secp256k1 secret scalar
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivKey(FixedBuf<32>);

impl PrivKey {
    pub const SIZE: usize = 32;
    pub const PREFIX: &'static str = "ebxprv";

    /// Generate a new random key
    pub fn from_random() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self(FixedBuf::new(secret_key.secret_bytes()))
    }

    /// Wrap 32 bytes, failing unless they are a valid secret scalar
    pub fn from_buf(buf: FixedBuf<32>) -> Result<Self> {
        SecretKey::from_slice(buf.as_ref()).map_err(|e| EbxError::InvalidKey(e.to_string()))?;
        Ok(Self(buf))
    }

    pub fn to_buf(&self) -> FixedBuf<32> {
        self.0
    }

    pub(crate) fn secret_key(&self) -> Result<SecretKey> {
        SecretKey::from_slice(self.0.as_ref()).map_err(|e| EbxError::InvalidKey(e.to_string()))
    }

    pub fn to_pub_key(&self) -> Result<PubKey> {
        PubKey::from_priv_key(self)
    }

    pub fn to_iso_str(&self) -> String {
        encode_iso_str(Self::PREFIX, self.0.as_ref())
    }

    pub fn from_iso_str(s: &str) -> Result<Self> {
        Self::from_buf(decode_iso_str(Self::PREFIX, s)?)
    }
}

// Never print the secret
impl fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivKey(..)")
    }
}

/// Compressed secp256k1 point
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PubKey(FixedBuf<33>);

impl PubKey {
    pub const SIZE: usize = 33;
    pub const PREFIX: &'static str = "ebxpub";

    pub fn from_priv_key(priv_key: &PrivKey) -> Result<Self> {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &priv_key.secret_key()?);
        Ok(Self(FixedBuf::new(public_key.serialize())))
    }

    /// Wrap 33 bytes, failing unless they encode a point on the curve
    pub fn from_buf(buf: FixedBuf<33>) -> Result<Self> {
        PublicKey::from_slice(buf.as_ref()).map_err(|e| EbxError::InvalidKey(e.to_string()))?;
        Ok(Self(buf))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_buf(FixedBuf::from_slice(bytes)?)
    }

    pub fn to_buf(&self) -> FixedBuf<33> {
        self.0
    }

    pub(crate) fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_slice(self.0.as_ref()).map_err(|e| EbxError::InvalidKey(e.to_string()))
    }

    pub fn to_iso_str(&self) -> String {
        encode_iso_str(Self::PREFIX, self.0.as_ref())
    }

    pub fn from_iso_str(s: &str) -> Result<Self> {
        Self::from_buf(decode_iso_str(Self::PREFIX, s)?)
    }

    pub fn is_valid_iso_str(s: &str) -> bool {
        Self::from_iso_str(s).is_ok()
    }
}

impl AsRef<[u8]> for PubKey {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKey({})", self.0.to_hex())
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso_str())
    }
}

impl FromStr for PubKey {
    type Err = EbxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_iso_str(s)
    }
}

impl TryFrom<String> for PubKey {
    type Error = EbxError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_iso_str(&s)
    }
}

impl From<PubKey> for String {
    fn from(pub_key: PubKey) -> Self {
        pub_key.to_iso_str()
    }
}

/// Public-key hash, `double_blake3(pubkey)`
///
/// This is the commitment carried by pay-to-PKH output scripts and the
/// address a wallet hands out.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pkh(FixedBuf<32>);

impl Pkh {
    pub const SIZE: usize = 32;
    pub const PREFIX: &'static str = "ebxpkh";

    pub fn from_pub_key(pub_key: &PubKey) -> Self {
        Self(double_blake3_hash(pub_key.as_ref()))
    }

    pub fn from_buf(buf: FixedBuf<32>) -> Self {
        Self(buf)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(Self(FixedBuf::from_slice(bytes)?))
    }

    pub fn to_buf(&self) -> FixedBuf<32> {
        self.0
    }

    pub fn to_iso_str(&self) -> String {
        encode_iso_str(Self::PREFIX, self.0.as_ref())
    }

    pub fn from_iso_str(s: &str) -> Result<Self> {
        Ok(Self(decode_iso_str(Self::PREFIX, s)?))
    }

    pub fn is_valid_iso_str(s: &str) -> bool {
        Self::from_iso_str(s).is_ok()
    }
}

impl AsRef<[u8]> for Pkh {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Debug for Pkh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pkh({})", self.0.to_hex())
    }
}

impl fmt::Display for Pkh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso_str())
    }
}

impl FromStr for Pkh {
    type Err = EbxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_iso_str(s)
    }
}

impl TryFrom<String> for Pkh {
    type Error = EbxError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_iso_str(&s)
    }
}

impl From<Pkh> for String {
    fn from(pkh: Pkh) -> Self {
        pkh.to_iso_str()
    }
}

/// Key pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub priv_key: PrivKey,
    pub pub_key: PubKey,
}

impl KeyPair {
    /// Generate a new key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::signing_only();
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            priv_key: PrivKey(FixedBuf::new(secret_key.secret_bytes())),
            pub_key: PubKey(FixedBuf::new(public_key.serialize())),
        }
    }

    pub fn from_priv_key(priv_key: PrivKey) -> Result<Self> {
        let pub_key = priv_key.to_pub_key()?;
        Ok(Self { priv_key, pub_key })
    }

    pub fn pkh(&self) -> Pkh {
        Pkh::from_pub_key(&self.pub_key)
    }
}
