//! On-disk block header decoding.
//!
//! The header is stored in a fixed endianness (big-endian here; the write
//! path picks the actual byte layout, this crate just has to be bit-exact
//! with it) and byte-swapped into host-native fields on read. The encoded
//! form is a fixed-layout `#[repr(C)]` struct viewed directly over the
//! buffer with `bytemuck`, the same way the allocator crate's page trailers
//! are viewed, rather than field-by-field cursor reads.

use bytemuck::{Pod, Zeroable};

/// Checksum covers only the first `COMPRESS_SKIP` bytes unless the header's
/// `DATA_CKSUM` flag is set, in which case it covers the whole block.
pub const COMPRESS_SKIP: usize = 64;

/// Flag bit: checksum covers the whole block rather than just the
/// `COMPRESS_SKIP` prefix.
pub const DATA_CKSUM: u8 = 0x1;

/// Byte length of the encoded header.
pub const HEADER_LEN: usize = 9;

/// The on-disk encoding: a fixed-layout struct with its multi-byte fields
/// stored big-endian, viewed directly over the buffer via `bytemuck`
/// rather than copied out field by field.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlockHeaderRaw {
    disk_size: [u8; 4],
    checksum: [u8; 4],
    flags: u8,
}

/// A block header, byte-swapped into host-native fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub disk_size: u32,
    pub checksum: u32,
    pub flags: u8,
}

impl BlockHeader {
    /// Read and byte-swap the header from the start of `buf`.
    pub fn read_from(buf: &[u8]) -> Self {
        let Some(bytes) = buf.get(..HEADER_LEN) else {
            return Self::default();
        };
        let raw: BlockHeaderRaw = *bytemuck::from_bytes(bytes);
        Self {
            disk_size: u32::from_be_bytes(raw.disk_size),
            checksum: u32::from_be_bytes(raw.checksum),
            flags: raw.flags,
        }
    }

    /// Byte-swap and write the header back to the start of `buf`.
    pub fn write_to(&self, buf: &mut [u8]) {
        let Some(bytes) = buf.get_mut(..HEADER_LEN) else {
            return;
        };
        let raw = BlockHeaderRaw {
            disk_size: self.disk_size.to_be_bytes(),
            checksum: self.checksum.to_be_bytes(),
            flags: self.flags,
        };
        bytes.copy_from_slice(bytemuck::bytes_of(&raw));
    }

    pub fn has_data_cksum(&self) -> bool {
        self.flags & DATA_CKSUM != 0
    }

    /// Bytes of `buf` the checksum is computed over, given this header's
    /// flags.
    pub fn checksum_coverage(&self, buf_len: usize) -> usize {
        if self.has_data_cksum() {
            buf_len
        } else {
            COMPRESS_SKIP.min(buf_len)
        }
    }
}

/// Compute the on-disk checksum of `bytes`: the low 32 bits of the xxHash3
/// digest, matching the root-page integrity check this workspace's allocator
/// crate already uses.
pub fn checksum(bytes: &[u8]) -> u32 {
    (xxhash_rust::xxh3::xxh3_64(bytes) & 0xFFFF_FFFF) as u32
}

/// Zero out the checksum field within the header's encoded bytes at the
/// start of `buf`, in place, so the checksum can be recomputed as it was at
/// write time.
pub fn zero_checksum_field(buf: &mut [u8]) {
    if buf.len() >= HEADER_LEN {
        buf[4..8].copy_from_slice(&[0, 0, 0, 0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_buffer() {
        let mut buf = vec![0u8; HEADER_LEN + 32];
        let header = BlockHeader {
            disk_size: 4096,
            checksum: 0x1234_5678,
            flags: DATA_CKSUM,
        };
        header.write_to(&mut buf);
        let read_back = BlockHeader::read_from(&buf);
        assert_eq!(header, read_back);
        assert!(read_back.has_data_cksum());
    }

    #[test]
    fn coverage_respects_flag() {
        let whole = BlockHeader {
            flags: DATA_CKSUM,
            ..Default::default()
        };
        assert_eq!(whole.checksum_coverage(4096), 4096);

        let prefix_only = BlockHeader::default();
        assert_eq!(prefix_only.checksum_coverage(4096), COMPRESS_SKIP);
    }

    #[test]
    fn zeroing_checksum_field_is_idempotent() {
        let mut buf = vec![0u8; HEADER_LEN];
        let header = BlockHeader {
            disk_size: 1,
            checksum: 0xffff_ffff,
            flags: 0,
        };
        header.write_to(&mut buf);
        zero_checksum_field(&mut buf);
        let cleared = BlockHeader::read_from(&buf);
        assert_eq!(cleared.checksum, 0);
        assert_eq!(cleared.disk_size, 1);
    }
}
