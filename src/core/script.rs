// Script representation: chunks, canonical bytes, text form and templates

use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::core::encoding::{decode_hex, encode_hex};
use crate::core::opcode::Opcode;
use crate::core::serialize::{read_bytes, read_u16, read_u32, read_u8};
use crate::core::{Pkh, PubKey, TxSignature};
use crate::error::{EbxError, Result};

/// One opcode, with its payload when the opcode is a PUSHDATA
///
/// A payload is present exactly when the opcode is `OP_PUSHDATA1/2/4`, and its
/// length always fits that opcode's length prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptChunk {
    opcode: u8,
    data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// A chunk with no payload; PUSHDATA opcodes must go through `from_data`
    pub fn from_opcode(opcode: Opcode) -> Result<Self> {
        if opcode.is_push_data() {
            return Err(EbxError::MalformedScript(format!("{} needs data", opcode.name())));
        }
        Ok(Self::bare(opcode))
    }

    /// A chunk for a raw opcode byte, defined or not
    pub fn from_byte(opcode: u8) -> Result<Self> {
        match Opcode::from_byte(opcode) {
            Some(op) => Self::from_opcode(op),
            None => Ok(Self { opcode, data: None }),
        }
    }

    /// Push `data` with the smallest PUSHDATA opcode that can carry it
    ///
    /// The empty string is pushed as `OP_0`.
    pub fn from_data(data: &[u8]) -> Result<Self> {
        if u32::try_from(data.len()).is_err() {
            return Err(EbxError::MalformedScript(format!(
                "push of {} bytes exceeds OP_PUSHDATA4",
                data.len()
            )));
        }
        Ok(Self::push(data))
    }

    /// Push a small integer using `OP_0`, `OP_1NEGATE` or `OP_1`..`OP_16`
    pub fn from_small_int(n: i8) -> Option<Self> {
        match n {
            0 => Some(Self::bare(Opcode::Op0)),
            -1 => Some(Self::bare(Opcode::Op1Negate)),
            1..=16 => Opcode::small_int(n as u8).map(Self::bare),
            _ => None,
        }
    }

    // callers pass non-PUSHDATA opcodes only
    fn bare(opcode: Opcode) -> Self {
        Self {
            opcode: opcode.to_byte(),
            data: None,
        }
    }

    // callers guarantee data.len() fits in u32
    fn push(data: &[u8]) -> Self {
        let opcode = match data.len() {
            0 => return Self::bare(Opcode::Op0),
            1..=0xff => Opcode::OpPushData1,
            0x100..=0xffff => Opcode::OpPushData2,
            _ => Opcode::OpPushData4,
        };
        Self {
            opcode: opcode.to_byte(),
            data: Some(data.to_vec()),
        }
    }

    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_byte(self.opcode)
    }

    /// The raw opcode byte, including undefined ones
    pub fn opcode_byte(&self) -> u8 {
        self.opcode
    }

    /// Payload of a PUSHDATA chunk
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Append the canonical bytes of this chunk
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.opcode);
        let Some(data) = &self.data else {
            return;
        };
        let len = data.len();
        match Opcode::from_byte(self.opcode) {
            Some(Opcode::OpPushData1) => buf.push(len as u8),
            Some(Opcode::OpPushData2) => buf.extend_from_slice(&(len as u16).to_le_bytes()),
            Some(Opcode::OpPushData4) => buf.extend_from_slice(&(len as u32).to_le_bytes()),
            _ => return,
        }
        buf.extend_from_slice(data);
    }

    /// Read one chunk; PUSHDATA lengths must be present, minimal and fully backed by data
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let opcode = read_u8(reader)?;
        let (len, min) = match Opcode::from_byte(opcode) {
            Some(Opcode::OpPushData1) => (read_u8(reader).map_err(truncated)? as u64, 1),
            Some(Opcode::OpPushData2) => (read_u16(reader).map_err(truncated)? as u64, 0x100),
            Some(Opcode::OpPushData4) => (read_u32(reader).map_err(truncated)? as u64, 0x10000),
            _ => return Ok(Self { opcode, data: None }),
        };
        if len < min {
            return Err(EbxError::MalformedScript(format!(
                "non-minimal push of {} bytes with opcode 0x{:02x}",
                len, opcode
            )));
        }
        let data = read_bytes(reader, len).map_err(truncated)?;
        Ok(Self {
            opcode,
            data: Some(data),
        })
    }
}

fn truncated(_: EbxError) -> EbxError {
    EbxError::MalformedScript("push data truncated".to_string())
}

/// Text prefix for an opcode byte with no name
const UNKNOWN_PREFIX: &str = "OP_UNKNOWN_0x";

impl fmt::Display for ScriptChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.data, Opcode::from_byte(self.opcode)) {
            (Some(data), _) => write!(f, "0x{}", encode_hex(data)),
            (None, Some(op)) => write!(f, "{}", op.name()),
            (None, None) => write!(f, "{}{:02x}", UNKNOWN_PREFIX, self.opcode),
        }
    }
}

/// Ordered sequence of chunks defining a spending condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Script {
    pub chunks: Vec<ScriptChunk>,
}

impl Script {
    pub fn new(chunks: Vec<ScriptChunk>) -> Self {
        Self { chunks }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Canonical bytes: opcode, then for PUSHDATA a little-endian length and the data
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for chunk in &self.chunks {
            chunk.write_to(&mut buf);
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut chunks = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            chunks.push(ScriptChunk::read_from(&mut cursor)?);
        }
        Ok(Self { chunks })
    }

    /// True when every chunk only pushes data or a constant
    pub fn is_push_only(&self) -> bool {
        self.chunks
            .iter()
            .all(|chunk| chunk.opcode().is_some_and(Opcode::is_push))
    }

    /// Pay-to-PKH output
    /// OP_DUP OP_DOUBLEBLAKE3 <pkh> OP_EQUALVERIFY OP_CHECKSIG
    pub fn from_pkh_output(pkh: &Pkh) -> Self {
        Self::new(vec![
            ScriptChunk::bare(Opcode::OpDup),
            ScriptChunk::bare(Opcode::OpDoubleBlake3),
            ScriptChunk::push(pkh.as_ref()),
            ScriptChunk::bare(Opcode::OpEqualVerify),
            ScriptChunk::bare(Opcode::OpCheckSig),
        ])
    }

    pub fn is_pkh_output(&self) -> bool {
        self.chunks.len() == 5
            && self.chunks[0].opcode() == Some(Opcode::OpDup)
            && self.chunks[1].opcode() == Some(Opcode::OpDoubleBlake3)
            && self.chunks[2].data().is_some_and(|d| d.len() == Pkh::SIZE)
            && self.chunks[3].opcode() == Some(Opcode::OpEqualVerify)
            && self.chunks[4].opcode() == Some(Opcode::OpCheckSig)
    }

    /// Hash committed to by a pay-to-PKH output
    pub fn pkh_output_hash(&self) -> Option<Pkh> {
        if !self.is_pkh_output() {
            return None;
        }
        self.chunks[2].data().and_then(|d| Pkh::from_slice(d).ok())
    }

    /// Pay-to-PKH input
    /// <signature> <pubkey>
    pub fn from_pkh_input(sig: &TxSignature, pub_key: &PubKey) -> Self {
        Self::new(vec![
            ScriptChunk::push(&sig.to_bytes()),
            ScriptChunk::push(pub_key.as_ref()),
        ])
    }

    pub fn is_pkh_input(&self) -> bool {
        self.chunks.len() == 2
            && self.chunks[0].data().is_some_and(|d| d.len() == TxSignature::SIZE)
            && self.chunks[1].data().is_some_and(|d| d.len() == PubKey::SIZE)
    }

    /// m-of-n multisig output
    /// OP_m <pubkey_1> .. <pubkey_n> OP_n OP_CHECKMULTISIG
    pub fn from_multisig_output(required: u8, pub_keys: &[PubKey]) -> Result<Self> {
        let n = u8::try_from(pub_keys.len()).map_err(|_| too_many_keys(pub_keys.len()))?;
        if n > 16 {
            return Err(too_many_keys(pub_keys.len()));
        }
        if required > n {
            return Err(EbxError::MalformedScript(format!(
                "{} signatures required from {} keys",
                required, n
            )));
        }
        let mut chunks = Vec::with_capacity(pub_keys.len() + 3);
        chunks.push(small_int_chunk(required));
        chunks.extend(pub_keys.iter().map(|pk| ScriptChunk::push(pk.as_ref())));
        chunks.push(small_int_chunk(n));
        chunks.push(ScriptChunk::bare(Opcode::OpCheckMultiSig));
        Ok(Self::new(chunks))
    }

    pub fn is_multisig_output(&self) -> bool {
        let len = self.chunks.len();
        if len < 3 || self.chunks[len - 1].opcode() != Some(Opcode::OpCheckMultiSig) {
            return false;
        }
        let Some(n) = chunk_small_int(&self.chunks[len - 2]) else {
            return false;
        };
        let Some(m) = chunk_small_int(&self.chunks[0]) else {
            return false;
        };
        m <= n
            && len == n as usize + 3
            && self.chunks[1..len - 2]
                .iter()
                .all(|c| c.data().is_some_and(|d| d.len() == PubKey::SIZE))
    }

    /// Unlocking script for a multisig output: signatures in key order
    pub fn from_multisig_input(sigs: &[TxSignature]) -> Self {
        Self::new(sigs.iter().map(|sig| ScriptChunk::push(&sig.to_bytes())).collect())
    }

    pub fn is_multisig_input(&self) -> bool {
        !self.chunks.is_empty()
            && self
                .chunks
                .iter()
                .all(|c| c.data().is_some_and(|d| d.len() == TxSignature::SIZE))
    }
}

fn too_many_keys(count: usize) -> EbxError {
    EbxError::MalformedScript(format!("{} keys exceeds multisig limit of 16", count))
}

fn small_int_chunk(n: u8) -> ScriptChunk {
    match Opcode::small_int(n) {
        Some(op) => ScriptChunk::bare(op),
        None => ScriptChunk::bare(Opcode::Op0),
    }
}

fn chunk_small_int(chunk: &ScriptChunk) -> Option<u8> {
    match chunk.opcode()? {
        Opcode::Op0 => Some(0),
        op => op.to_small_int(),
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chunk) in self.chunks.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", chunk)?;
        }
        Ok(())
    }
}

/// Parse the text form: `OP_*` names, `OP_UNKNOWN_0x<byte>` and `0x<hex>` data pushes
/// separated by spaces
impl FromStr for Script {
    type Err = EbxError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chunks = Vec::new();
        for token in s.split_whitespace() {
            if let Some(hex_str) = token.strip_prefix("0x") {
                chunks.push(ScriptChunk::from_data(&decode_hex(hex_str)?)?);
            } else if let Some(hex_str) = token.strip_prefix(UNKNOWN_PREFIX) {
                chunks.push(parse_unknown(token, hex_str)?);
            } else {
                let op = Opcode::from_name(token)
                    .ok_or_else(|| EbxError::InvalidOpcode(token.to_string()))?;
                chunks.push(ScriptChunk::from_opcode(op)?);
            }
        }
        Ok(Self { chunks })
    }
}

/// `OP_UNKNOWN_0xNN` names exactly one undefined opcode byte
fn parse_unknown(token: &str, hex_str: &str) -> Result<ScriptChunk> {
    let invalid = || EbxError::InvalidOpcode(token.to_string());
    let bytes = decode_hex(hex_str).map_err(|_| invalid())?;
    let &[byte] = bytes.as_slice() else {
        return Err(invalid());
    };
    if Opcode::from_byte(byte).is_some() {
        return Err(invalid());
    }
    ScriptChunk::from_byte(byte)
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FixedBuf, PrivKey};

    #[test]
    fn test_chunk_from_data_is_minimal() {
        assert_eq!(ScriptChunk::from_data(&[]).unwrap().opcode(), Some(Opcode::Op0));
        assert_eq!(ScriptChunk::from_data(&[1]).unwrap().opcode(), Some(Opcode::OpPushData1));
        assert_eq!(ScriptChunk::from_data(&[0; 255]).unwrap().opcode(), Some(Opcode::OpPushData1));
        assert_eq!(ScriptChunk::from_data(&[0; 256]).unwrap().opcode(), Some(Opcode::OpPushData2));
        assert_eq!(ScriptChunk::from_data(&[0; 0x10000]).unwrap().opcode(), Some(Opcode::OpPushData4));
    }

    #[test]
    fn test_canonical_bytes() {
        let script: Script = "OP_1 0x0102 OP_ADD".parse().unwrap();
        assert_eq!(script.to_bytes(), vec![0x51, 0x4c, 0x02, 0x01, 0x02, 0x93]);

        let long = Script::new(vec![ScriptChunk::from_data(&[9; 300]).unwrap()]);
        let bytes = long.to_bytes();
        assert_eq!(&bytes[..3], &[0x4d, 0x2c, 0x01]); // 300 little-endian
        assert_eq!(Script::from_bytes(&bytes).unwrap(), long);
    }

    #[test]
    fn test_bytes_roundtrip_keeps_unknown_opcodes() {
        let bytes = vec![0x51, 0x01, 0xff, 0x4c, 0x01, 0xaa];
        let script = Script::from_bytes(&bytes).unwrap();
        assert_eq!(script.chunks.len(), 4);
        assert_eq!(script.to_bytes(), bytes);
    }

    #[test]
    fn test_truncated_push() {
        assert!(matches!(Script::from_bytes(&[0x4c]), Err(EbxError::MalformedScript(_))));
        assert!(matches!(Script::from_bytes(&[0x4c, 0x05, 1, 2]), Err(EbxError::MalformedScript(_))));
        assert!(matches!(
            Script::from_bytes(&[0x4e, 0xff, 0xff, 0xff, 0xff, 0]),
            Err(EbxError::MalformedScript(_))
        ));
    }

    #[test]
    fn test_non_minimal_push() {
        let mut bytes = vec![0x4d, 0x02, 0x00];
        bytes.extend_from_slice(&[1, 2]);
        assert!(matches!(Script::from_bytes(&bytes), Err(EbxError::MalformedScript(_))));
        assert!(matches!(Script::from_bytes(&[0x4c, 0x00]), Err(EbxError::MalformedScript(_))));
    }

    #[test]
    fn test_text_form() {
        let text = "OP_DUP OP_DOUBLEBLAKE3 0x00ff OP_EQUALVERIFY OP_CHECKSIG";
        let script: Script = text.parse().unwrap();
        assert_eq!(script.to_string(), text);
        assert_eq!("".parse::<Script>().unwrap(), Script::default());
        assert!(matches!("OP_FOO".parse::<Script>(), Err(EbxError::InvalidOpcode(_))));
        assert!("OP_PUSHDATA1".parse::<Script>().is_err());
        assert_eq!("0xZZ".parse::<Script>(), Err(EbxError::InvalidHex));
    }

    #[test]
    fn test_pkh_templates() {
        let key = PrivKey::from_random();
        let pub_key = key.to_pub_key().unwrap();
        let pkh = Pkh::from_pub_key(&pub_key);

        let output = Script::from_pkh_output(&pkh);
        assert!(output.is_pkh_output());
        assert_eq!(output.pkh_output_hash(), Some(pkh));

        let sig = TxSignature::new(TxSignature::SIGHASH_ALL, FixedBuf::alloc(1));
        let input = Script::from_pkh_input(&sig, &pub_key);
        assert!(input.is_pkh_input());
        assert!(input.is_push_only());
        assert!(!output.is_push_only());
    }

    #[test]
    fn test_multisig_templates() {
        let keys: Vec<PubKey> = (0..3)
            .map(|_| PrivKey::from_random().to_pub_key().unwrap())
            .collect();
        let output = Script::from_multisig_output(2, &keys).unwrap();
        assert!(output.is_multisig_output());
        assert_eq!(output.chunks[0].opcode(), Some(Opcode::Op2));
        assert_eq!(output.chunks[4].opcode(), Some(Opcode::Op3));

        assert!(Script::from_multisig_output(4, &keys).is_err());

        let sig = TxSignature::new(TxSignature::SIGHASH_ALL, FixedBuf::alloc(1));
        let input = Script::from_multisig_input(&[sig, sig]);
        assert!(input.is_multisig_input());
    }

    #[test]
    fn test_serde_as_text() {
        let script: Script = "OP_1 0xbeef".parse().unwrap();
        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(json, "\"OP_1 0xbeef\"");
        assert_eq!(serde_json::from_str::<Script>(&json).unwrap(), script);
    }

    #[test]
    fn test_unknown_opcode_text_round_trip() {
        let bytes = vec![0x51, 0x01, 0xff, 0x4c, 0x01, 0xaa];
        let script = Script::from_bytes(&bytes).unwrap();
        let text = script.to_string();
        assert_eq!(text, "OP_1 OP_UNKNOWN_0x01 OP_UNKNOWN_0xff 0xaa");

        let parsed: Script = text.parse().unwrap();
        assert_eq!(parsed, script);
        assert_eq!(parsed.to_bytes(), bytes);

        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(serde_json::from_str::<Script>(&json).unwrap().to_bytes(), bytes);
    }

    #[test]
    fn test_unknown_opcode_token_is_strict() {
        // named opcodes keep their own token
        assert!(matches!("OP_UNKNOWN_0x51".parse::<Script>(), Err(EbxError::InvalidOpcode(_))));
        assert!(matches!("OP_UNKNOWN_0x4c".parse::<Script>(), Err(EbxError::InvalidOpcode(_))));
        assert!(matches!("OP_UNKNOWN_0xffff".parse::<Script>(), Err(EbxError::InvalidOpcode(_))));
        assert!(matches!("OP_UNKNOWN_0xzz".parse::<Script>(), Err(EbxError::InvalidOpcode(_))));
    }

    #[test]
    fn test_chunk_constructors_keep_payload_invariant() {
        assert!(ScriptChunk::from_opcode(Opcode::OpPushData1).is_err());
        assert!(ScriptChunk::from_opcode(Opcode::OpPushData4).is_err());
        assert!(ScriptChunk::from_byte(0x4d).is_err());

        let unknown = ScriptChunk::from_byte(0xff).unwrap();
        assert_eq!(unknown.opcode(), None);
        assert_eq!(unknown.opcode_byte(), 0xff);
        assert_eq!(unknown.data(), None);

        let push = ScriptChunk::from_data(&[7; 300]).unwrap();
        assert_eq!(push.data().map(<[u8]>::len), Some(300));
        let mut buf = Vec::new();
        push.write_to(&mut buf);
        assert_eq!(&buf[..3], &[0x4d, 0x2c, 0x01]);
        assert_eq!(buf.len(), 303);
    }
}
