//! Multi-object block handle cache.
//!
//! Resolves an `object_id` from an address cookie to a concrete block
//! handle, reference-counted so the handle is released exactly once per
//! acquisition regardless of which exit path a caller takes.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::BlockManagerError;

/// Something a concrete block handle is backed by. Left minimal: this crate
/// only needs to know an object exists and what file it reads from, not the
/// full file-handle lifecycle (owned by the external storage layer).
pub trait BlockObject: Send + Sync {
    fn object_id(&self) -> u32;
}

struct Entry {
    object: Box<dyn BlockObject>,
    refcount: usize,
}

/// Reference-counted cache of block handles, keyed by `object_id`.
pub struct HandleCache {
    entries: Mutex<HashMap<u32, Entry>>,
}

impl Default for HandleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register an object so it can later be checked out by id.
    pub fn register(&self, object: Box<dyn BlockObject>) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            object.object_id(),
            Entry {
                object,
                refcount: 0,
            },
        );
    }

    /// Acquire a handle for `object_id`, bumping its refcount. The returned
    /// guard releases the refcount on drop regardless of how the caller's
    /// scope exits.
    pub fn acquire<'a>(&'a self, object_id: u32) -> Result<HandleGuard<'a>, BlockManagerError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(&object_id)
            .ok_or(BlockManagerError::UnknownObject(object_id))?;
        entry.refcount += 1;
        drop(entries);
        Ok(HandleGuard {
            cache: self,
            object_id,
        })
    }

    fn release(&self, object_id: u32) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(&object_id) {
            entry.refcount = entry
                .refcount
                .checked_sub(1)
                .expect("block handle released more times than it was acquired");
        }
    }
}

/// RAII guard releasing the handle's refcount on every exit path.
pub struct HandleGuard<'a> {
    cache: &'a HandleCache,
    object_id: u32,
}

impl HandleGuard<'_> {
    pub fn object_id(&self) -> u32 {
        self.object_id
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        self.cache.release(self.object_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyObject(u32);
    impl BlockObject for DummyObject {
        fn object_id(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn acquire_and_release_balance() {
        let cache = HandleCache::new();
        cache.register(Box::new(DummyObject(1)));
        {
            let _guard = cache.acquire(1).unwrap();
            let _guard2 = cache.acquire(1).unwrap();
        }
        // Both guards dropped; a further acquire/drop cycle should not panic.
        let _guard = cache.acquire(1).unwrap();
    }

    #[test]
    fn unknown_object_errors() {
        let cache = HandleCache::new();
        assert!(matches!(
            cache.acquire(99),
            Err(BlockManagerError::UnknownObject(99))
        ));
    }
}
