// Binary encoding helpers shared by scripts, transactions and headers

use std::io::{Cursor, Read};
use crate::core::FixedBuf;
use crate::error::{EbxError, Result};

/// Types with a canonical binary encoding
pub trait Serializable: Sized {
    /// Append the canonical bytes
    fn write_to(&self, buf: &mut Vec<u8>);

    /// Read one value from the front of a stream
    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }

    /// Decode a complete buffer; bytes left over are an error
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let value = Self::read_from(&mut cursor)?;
        if cursor.position() as usize != data.len() {
            return Err(EbxError::TrailingData);
        }
        Ok(value)
    }
}

/// Write a variable-length integer (VarInt)
/// Small values take one byte; larger ones a marker byte plus 2, 4 or 8 bytes
pub fn write_varint(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => {
            buf.push(value as u8);
        }
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x10000..=0xffffffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Read a variable-length integer, rejecting non-minimal encodings
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let first = read_u8(reader)?;

    let (value, min) = match first {
        0..=0xfc => return Ok(first as u64),
        0xfd => (read_u16(reader)? as u64, 0xfd),
        0xfe => (read_u32(reader)? as u64, 0x10000),
        0xff => (read_u64(reader)?, 0x100000000),
    };
    if value < min {
        return Err(EbxError::NonMinimalEncoding);
    }
    Ok(value)
}

/// Write bytes with length prefix (VarInt length + data)
pub fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Read bytes with length prefix
pub fn read_var_bytes<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let len = read_varint(reader)?;
    read_bytes(reader, len)
}

/// Read exactly `len` bytes without trusting `len` for the allocation size
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    Read::take(&mut *reader, len).read_to_end(&mut data).map_err(|_| EbxError::NotEnoughData)?;
    if (data.len() as u64) < len {
        return Err(EbxError::NotEnoughData);
    }
    Ok(data)
}

pub fn read_fixed<R: Read + ?Sized, const N: usize>(reader: &mut R) -> Result<FixedBuf<N>> {
    let mut bytes = [0u8; N];
    reader.read_exact(&mut bytes).map_err(|_| EbxError::NotEnoughData)?;
    Ok(FixedBuf::new(bytes))
}

pub fn read_u8<R: Read + ?Sized>(reader: &mut R) -> Result<u8> {
    Ok(read_fixed::<R, 1>(reader)?[0])
}

pub fn read_u16<R: Read + ?Sized>(reader: &mut R) -> Result<u16> {
    Ok(u16::from_le_bytes(read_fixed::<R, 2>(reader)?.into_inner()))
}

pub fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    Ok(u32::from_le_bytes(read_fixed::<R, 4>(reader)?.into_inner()))
}

pub fn read_u64<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    Ok(u64::from_le_bytes(read_fixed::<R, 8>(reader)?.into_inner()))
}
