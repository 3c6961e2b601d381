//! External chunk cache collaborator.
//!
//! Named interface only: the real chunk cache lives outside this crate. The
//! block manager treats an `ENOSPC`-shaped miss as non-fatal and falls
//! through to a direct read.

/// Outcome of a chunk cache lookup.
pub enum ChunkCacheHit {
    /// The cache had the bytes; they were copied into `dest`.
    Hit,
    /// The cache did not have the bytes.
    Miss,
    /// The cache is out of space to service the request. Not fatal: the
    /// caller falls through to a direct read.
    OutOfSpace,
}

/// The external chunk cache collaborator.
pub trait ChunkCache: Send + Sync {
    /// Attempt to fill `dest` with `size` bytes for `(object_id, offset)`.
    fn get(&self, object_id: u32, offset: u64, size: u32, dest: &mut [u8]) -> ChunkCacheHit;

    /// Evict a (possibly stale) cached entry.
    fn invalidate(&self, object_id: u32, offset: u64, size: u32);
}

/// A chunk cache that never has anything cached, useful as the default when
/// no chunk cache is configured.
#[derive(Default)]
pub struct NoChunkCache;

impl ChunkCache for NoChunkCache {
    fn get(&self, _object_id: u32, _offset: u64, _size: u32, _dest: &mut [u8]) -> ChunkCacheHit {
        ChunkCacheHit::Miss
    }

    fn invalidate(&self, _object_id: u32, _offset: u64, _size: u32) {}
}
