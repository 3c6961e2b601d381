//! Address cookie encoding.
//!
//! The cookie is produced by the write path (external to this crate); the
//! block manager only needs to be bit-exact with its decoder. `encode` is
//! kept alongside `decode` so tests in this crate can round-trip a cookie
//! without depending on a second crate standing in for the write path.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::BlockManagerError;

/// Decoded `(object_id, file_offset, size, expected_checksum)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressCookie {
    pub object_id: u32,
    pub file_offset: u64,
    pub size: u32,
    pub checksum: u32,
}

impl AddressCookie {
    /// Encode this cookie into its on-disk byte sequence: a `u32` object id,
    /// a varint file offset, a `u32` size, and a `u32` checksum, all little
    /// endian except the varint.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 10 + 4 + 4);
        buf.write_u32::<LittleEndian>(self.object_id).unwrap();
        write_varint(&mut buf, self.file_offset);
        buf.write_u32::<LittleEndian>(self.size).unwrap();
        buf.write_u32::<LittleEndian>(self.checksum).unwrap();
        buf
    }

    /// Decode a cookie from its byte sequence.
    pub fn decode(bytes: &[u8]) -> Result<Self, BlockManagerError> {
        let mut cursor = Cursor::new(bytes);
        let object_id = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| BlockManagerError::MalformedCookie)?;
        let file_offset =
            read_varint(&mut cursor).ok_or(BlockManagerError::MalformedCookie)?;
        let size = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| BlockManagerError::MalformedCookie)?;
        let checksum = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| BlockManagerError::MalformedCookie)?;
        Ok(Self {
            object_id,
            file_offset,
            size,
            checksum,
        })
    }
}

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(cursor: &mut Cursor<&[u8]>) -> Option<u64> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = cursor.read_u8().ok()?;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cookie = AddressCookie {
            object_id: 7,
            file_offset: 1 << 40,
            size: 4096,
            checksum: 0xdeadbeef,
        };
        let bytes = cookie.encode();
        assert_eq!(AddressCookie::decode(&bytes).unwrap(), cookie);
    }

    #[test]
    fn truncated_cookie_is_malformed() {
        assert!(matches!(
            AddressCookie::decode(&[1, 2, 3]),
            Err(BlockManagerError::MalformedCookie)
        ));
    }
}
