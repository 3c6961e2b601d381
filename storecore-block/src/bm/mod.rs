//! Block manager read path.
//!
//! Converts an address cookie plus a destination buffer into verified page
//! bytes: resolve the block handle, consult the chunk cache, read directly
//! on a miss, verify the checksum, retry once on a chunk-cache-stale
//! mismatch, and dump + latch corruption on a second mismatch.

pub mod chunk_cache;
pub mod cookie;
pub mod handle;
pub mod header;
pub mod throttle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chunk_cache::{ChunkCache, ChunkCacheHit, NoChunkCache};
use cookie::AddressCookie;
use handle::{BlockObject, HandleCache};
use header::BlockHeader;
use throttle::{CapacityThrottle, IoDirection, NoThrottle};

use crate::error::BlockManagerError;

/// Minimum byte alignment a read buffer must satisfy for a direct read.
const BUFFER_ALIGNMENT: usize = 512;

/// The external file/object I/O collaborator, named here only as the
/// interface the block manager drives.
pub trait BlockSource: Send + Sync {
    fn read_at(&self, object_id: u32, offset: u64, size: u32, dest: &mut [u8]) -> std::io::Result<()>;

    /// Post-read hook: advise the OS the bytes can be discarded from its page
    /// cache. Optional; the default does nothing.
    fn discard_cached(&self, _object_id: u32, _offset: u64, _size: u32) {}
}

/// Per-read options controlling corruption handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    pub session: u64,
    /// Session requested quiet corruption handling: corruption returns an
    /// error instead of panicking.
    pub quiet_corruption: bool,
    /// Session is in verify mode: same effect as `quiet_corruption` on the
    /// panic/error choice.
    pub verify: bool,
}

/// Shared, monotonic "this connection has seen data corruption" latch.
#[derive(Clone, Default)]
pub struct CorruptionFlag(Arc<AtomicBool>);

impl CorruptionFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Block manager read path.
pub struct BlockManager {
    allocation_size: u32,
    handles: HandleCache,
    chunk_cache: Option<Box<dyn ChunkCache>>,
    throttle: Box<dyn CapacityThrottle>,
    source: Box<dyn BlockSource>,
    corrupted: CorruptionFlag,
}

impl BlockManager {
    pub fn new(allocation_size: u32, source: Box<dyn BlockSource>) -> Self {
        Self {
            allocation_size,
            handles: HandleCache::new(),
            chunk_cache: None,
            throttle: Box::new(NoThrottle),
            source,
            corrupted: CorruptionFlag::default(),
        }
    }

    pub fn with_chunk_cache(mut self, cache: Box<dyn ChunkCache>) -> Self {
        self.chunk_cache = Some(cache);
        self
    }

    pub fn with_throttle(mut self, throttle: Box<dyn CapacityThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn register_object(&self, object: Box<dyn BlockObject>) {
        self.handles.register(object);
    }

    /// The connection-wide data corruption latch. Clone to observe it from
    /// elsewhere; it only ever transitions false -> true.
    pub fn corruption_flag(&self) -> CorruptionFlag {
        self.corrupted.clone()
    }

    /// Decode `cookie_bytes` and fill `buf` with verified page bytes.
    ///
    /// `aligned` tracks whether the caller's buffer is known to satisfy the
    /// block manager's alignment requirement; it is set to `true` whenever
    /// this call reallocates `buf` to restore alignment.
    pub fn read(
        &self,
        cookie_bytes: &[u8],
        buf: &mut Vec<u8>,
        aligned: &mut bool,
        opts: &ReadOptions,
    ) -> Result<(), BlockManagerError> {
        let cookie = AddressCookie::decode(cookie_bytes)?;
        if cookie.size < self.allocation_size {
            return Err(BlockManagerError::InvalidSize {
                size: cookie.size,
                allocation_size: self.allocation_size,
            });
        }

        // Released on every exit path via Drop, regardless of outcome below.
        let _handle = self.handles.acquire(cookie.object_id)?;

        self.prepare_buffer(buf, aligned, cookie.size as usize);
        let needed = cookie.size as usize;
        let dest = &mut buf[..needed];

        self.throttle
            .throttle(opts.session, cookie.size as u64, IoDirection::Read);

        let served_from_cache = self.try_chunk_cache(&cookie, dest);
        if !served_from_cache {
            self.source
                .read_at(cookie.object_id, cookie.file_offset, cookie.size, dest)
                .map_err(BlockManagerError::Io)?;
        }

        if verify(dest, &cookie) {
            self.source
                .discard_cached(cookie.object_id, cookie.file_offset, cookie.size);
            return Ok(());
        }

        if let Some(cache) = &self.chunk_cache {
            tracing::debug!(
                object_id = cookie.object_id,
                offset = cookie.file_offset,
                "checksum mismatch, invalidating chunk cache entry and retrying"
            );
            cache.invalidate(cookie.object_id, cookie.file_offset, cookie.size);
            self.source
                .read_at(cookie.object_id, cookie.file_offset, cookie.size, dest)
                .map_err(BlockManagerError::Io)?;
            if verify(dest, &cookie) {
                self.source
                    .discard_cached(cookie.object_id, cookie.file_offset, cookie.size);
                return Ok(());
            }
        }

        self.handle_corruption(dest, &cookie, opts)
    }

    fn prepare_buffer(&self, buf: &mut Vec<u8>, aligned: &mut bool, needed: usize) {
        let misaligned = !*aligned || (buf.as_ptr() as usize) % BUFFER_ALIGNMENT != 0;
        if buf.len() < needed || misaligned {
            let memsize = buf.len();
            let new_len = needed.max(memsize + 10);
            buf.clear();
            buf.resize(new_len, 0);
            *aligned = true;
        }
    }

    fn try_chunk_cache(&self, cookie: &AddressCookie, dest: &mut [u8]) -> bool {
        let Some(cache) = &self.chunk_cache else {
            return false;
        };
        match cache.get(cookie.object_id, cookie.file_offset, cookie.size, dest) {
            ChunkCacheHit::Hit => true,
            ChunkCacheHit::Miss | ChunkCacheHit::OutOfSpace => false,
        }
    }

    fn handle_corruption(
        &self,
        dest: &[u8],
        cookie: &AddressCookie,
        opts: &ReadOptions,
    ) -> Result<(), BlockManagerError> {
        dump_corruption(cookie.object_id, cookie.file_offset, dest);
        self.corrupted.set();
        tracing::error!(
            object_id = cookie.object_id,
            offset = cookie.file_offset,
            size = cookie.size,
            "block corruption detected"
        );
        if opts.quiet_corruption || opts.verify {
            Err(BlockManagerError::Corruption {
                object_id: cookie.object_id,
                offset: cookie.file_offset,
                size: cookie.size,
            })
        } else {
            panic!(
                "{}",
                BlockManagerError::Panic {
                    object_id: cookie.object_id,
                    offset: cookie.file_offset,
                }
            );
        }
    }
}

/// Verify a freshly read block's checksum against the cookie's expected
/// value with a two-stage check: the header's own checksum field must match
/// the cookie, and recomputing over the checksum coverage with that field
/// zeroed must reproduce the same value.
fn verify(dest: &[u8], cookie: &AddressCookie) -> bool {
    let header = BlockHeader::read_from(dest);
    if header.checksum != cookie.checksum {
        return false;
    }
    let coverage = header.checksum_coverage(dest.len());
    let mut scratch = dest[..coverage].to_vec();
    header::zero_checksum_field(&mut scratch);
    header::checksum(&scratch) == header.checksum
}

fn dump_corruption(object_id: u32, offset: u64, buf: &[u8]) {
    for (i, chunk) in buf.chunks(1024).enumerate() {
        let chunk_offset = offset + (i * 1024) as u64;
        let chunk_checksum = header::checksum(chunk);
        tracing::error!(
            "{{{object_id}: {chunk_offset}, {len}, #{chunk_checksum:08x}}}",
            object_id = object_id,
            chunk_offset = chunk_offset,
            len = chunk.len(),
            chunk_checksum = chunk_checksum,
        );
    }
}
