use thiserror::Error;

/// Errors surfaced by the region allocator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AllocError {
    /// No region had a free slot and a new region could not be added because
    /// `region_count` is already at its configured cap.
    #[error("out of allocator capacity: {region_count} regions already in use, cap is {cap}")]
    OutOfCapacity { region_count: usize, cap: usize },
    /// The requested page size doesn't fit within a single region.
    #[error("requested page size {requested} exceeds the region size {region_size}")]
    PageTooLarge { requested: usize, region_size: usize },
    /// The page handle doesn't refer to a live allocation (double free, or a
    /// handle from a different allocator instance).
    #[error("page handle does not refer to a live allocation")]
    InvalidPage,
    /// The spill handle doesn't refer to a live allocation.
    #[error("spill handle does not refer to a live allocation")]
    InvalidSpill,
}

/// Errors surfaced by the block manager read path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BlockManagerError {
    /// `size` from the address cookie was smaller than the configured
    /// allocation size.
    #[error("invalid block size {size}: must be at least the allocation size {allocation_size}")]
    InvalidSize { size: u32, allocation_size: u32 },
    /// No block handle is registered for the cookie's `object_id`.
    #[error("no block handle registered for object id {0}")]
    UnknownObject(u32),
    /// The address cookie's bytes could not be decoded.
    #[error("malformed address cookie")]
    MalformedCookie,
    /// The underlying file I/O failed.
    #[error("I/O error reading block")]
    Io(#[source] std::io::Error),
    /// Checksum verification failed twice in a row (direct read, then a
    /// chunk-cache-invalidated retry). The buffer has already been dumped.
    #[error("data corruption detected for object {object_id} at offset {offset}, size {size}")]
    Corruption {
        object_id: u32,
        offset: u64,
        size: u32,
    },
    /// Corruption occurred and the caller was not in quiet-corruption or
    /// verify mode, so this is unrecoverable.
    #[error("unrecoverable corruption for object {object_id} at offset {offset}")]
    Panic { object_id: u32, offset: u64 },
}
