//! Region-based page allocator.
//!
//! Each region is a fixed-capacity byte arena carved into [`SLOTS_PER_REGION`]
//! page slots. Allocating a page claims one slot; allocating spill bytes for a
//! page bumps further into the owning page's region, or — if that region has
//! no room left — spills into a freshly added region. Regions are tracked in
//! a slab so freeing one never reindexes the handles still held by live
//! pages.

mod region;

use std::sync::Mutex;

pub use region::ALL_FREE;
use region::{Region, SLOTS_PER_REGION};

use crate::error::AllocError;

/// A handle identifying a single page slot inside a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PageId {
    region: usize,
    slot: u8,
}

/// A page allocated out of the allocator. Not `Clone`: a page is owned by
/// whoever allocated it until it's handed back with [`Allocator::free_page`].
#[derive(Debug)]
pub struct Page {
    id: PageId,
    len: usize,
}

impl Page {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A handle identifying a single spill allocation owned by some [`Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpillHandle {
    owner: PageId,
    /// Index into the owning page slot's `spills` vec.
    slot_index: usize,
    len: usize,
}

impl SpillHandle {
    pub fn len(&self) -> usize {
        self.len
    }
}

struct AllocatorInner {
    regions: Vec<Option<Region>>,
}

/// Region-backed fixed-size page slot allocator with per-page spill
/// allocations.
pub struct Allocator {
    region_size: usize,
    region_count_cap: usize,
    inner: Mutex<AllocatorInner>,
}

impl Allocator {
    /// Construct an allocator with a configurable region byte-size and
    /// maximum region count.
    pub fn create(region_size: usize, region_count: usize) -> Self {
        Self {
            region_size,
            region_count_cap: region_count,
            inner: Mutex::new(AllocatorInner {
                regions: Vec::new(),
            }),
        }
    }

    /// Number of regions currently in use.
    pub fn region_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .regions
            .iter()
            .filter(|r| r.is_some())
            .count()
    }

    /// Number of pages currently allocated and not yet freed.
    pub fn outstanding_pages(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .regions
            .iter()
            .flatten()
            .map(|r| SLOTS_PER_REGION - r.slot_free.count_ones() as usize)
            .sum()
    }

    /// Read the raw free-slot bitmap of a region, for tests and diagnostics
    /// (1 = free). Panics if the region index is not in use.
    pub fn region_bitmap(&self, region_idx: usize) -> u8 {
        let inner = self.inner.lock().unwrap();
        inner.regions[region_idx]
            .as_ref()
            .expect("region index is not in use")
            .slot_free
    }

    fn find_region_with_room(inner: &AllocatorInner, size: usize) -> Option<usize> {
        inner.regions.iter().enumerate().find_map(|(i, r)| {
            let r = r.as_ref()?;
            if r.first_free_slot().is_some() && r.room() >= size {
                Some(i)
            } else {
                None
            }
        })
    }

    /// Insert a freshly created region into the slab, reusing a vacated slot
    /// if one exists. Fails if doing so would exceed `region_count`.
    fn add_region(
        inner: &mut AllocatorInner,
        region_size: usize,
        cap: usize,
    ) -> Result<usize, AllocError> {
        let active = inner.regions.iter().filter(|r| r.is_some()).count();
        if active >= cap {
            return Err(AllocError::OutOfCapacity {
                region_count: active,
                cap,
            });
        }
        if let Some(idx) = inner.regions.iter().position(|r| r.is_none()) {
            inner.regions[idx] = Some(Region::new(region_size));
            Ok(idx)
        } else {
            inner.regions.push(Some(Region::new(region_size)));
            Ok(inner.regions.len() - 1)
        }
    }

    /// Release a region if it has no occupied slots and no spill allocations
    /// left in it. Immediate eviction, per the resolved Open Question.
    fn maybe_release(inner: &mut AllocatorInner, idx: usize) {
        if inner.regions[idx].as_ref().is_some_and(Region::is_empty) {
            tracing::debug!(region = idx, "releasing empty region");
            inner.regions[idx] = None;
        }
    }

    /// Allocate a page of at least `size` bytes.
    pub fn alloc_page(&self, size: usize) -> Result<Page, AllocError> {
        if size > self.region_size {
            return Err(AllocError::PageTooLarge {
                requested: size,
                region_size: self.region_size,
            });
        }
        let mut inner = self.inner.lock().unwrap();
        let region_idx = match Self::find_region_with_room(&inner, size) {
            Some(idx) => idx,
            None => Self::add_region(&mut inner, self.region_size, self.region_count_cap)?,
        };
        let region = inner.regions[region_idx].as_mut().unwrap();
        let slot = region
            .first_free_slot()
            .expect("region selected for allocation must have a free slot");
        region.occupy_slot(
            slot,
            region::PageSlot {
                bytes: vec![0u8; size],
                spills: Vec::new(),
            },
        );
        tracing::trace!(region = region_idx, slot, size, "allocated page");
        Ok(Page {
            id: PageId {
                region: region_idx,
                slot: slot as u8,
            },
            len: size,
        })
    }

    /// Allocate `bytes` of spill memory associated with `owner`. Returns
    /// `None` (the null sentinel) for a zero-byte request. The bytes are
    /// stored attached to `owner`'s slot; `region` bookkeeping here tracks
    /// only which region's capacity the allocation counts against, so a
    /// spill that overflows the owner's region doesn't need to relocate the
    /// owner's page data.
    pub fn zalloc(&self, bytes: usize, owner: &Page) -> Result<Option<SpillHandle>, AllocError> {
        if bytes == 0 {
            return Ok(None);
        }
        let mut inner = self.inner.lock().unwrap();

        let home_has_room = inner.regions[owner.id.region]
            .as_ref()
            .is_some_and(|r| r.room() >= bytes);

        let host_region = if home_has_room {
            owner.id.region
        } else {
            let idx = Self::add_region(&mut inner, self.region_size, self.region_count_cap)?;
            tracing::debug!(region = idx, bytes, "spilled into new region");
            idx
        };

        inner.regions[host_region].as_mut().unwrap().arena_used += bytes;
        if host_region != owner.id.region {
            inner.regions[host_region]
                .as_mut()
                .unwrap()
                .spill_owners
                .insert((owner.id.region, owner.id.slot));
        }

        let home = inner.regions[owner.id.region].as_mut().unwrap();
        let slot = home.slots[owner.id.slot as usize]
            .as_mut()
            .ok_or(AllocError::InvalidPage)?;
        slot.spills.push((host_region, vec![0u8; bytes]));
        let slot_index = slot.spills.len() - 1;

        Ok(Some(SpillHandle {
            owner: owner.id,
            slot_index,
            len: bytes,
        }))
    }

    /// Release `page`'s slot and all spill allocations it owns.
    pub fn free_page(&self, page: Page) -> Result<(), AllocError> {
        let mut inner = self.inner.lock().unwrap();
        let home = inner.regions[page.id.region]
            .as_mut()
            .ok_or(AllocError::InvalidPage)?;
        let slot = home
            .vacate_slot(page.id.slot as usize)
            .ok_or(AllocError::InvalidPage)?;

        for (spill_region, spill_bytes) in slot.spills {
            if let Some(r) = inner.regions[spill_region].as_mut() {
                r.arena_used = r.arena_used.saturating_sub(spill_bytes.len());
                r.spill_owners.remove(&(page.id.region, page.id.slot));
                Self::maybe_release(&mut inner, spill_region);
            }
        }
        Self::maybe_release(&mut inner, page.id.region);
        tracing::trace!(region = page.id.region, slot = page.id.slot, "freed page");
        Ok(())
    }

    /// Borrow a page's bytes for reading, holding the allocator lock for the
    /// guard's lifetime.
    pub fn page_bytes<'a>(&'a self, page: &Page) -> PageGuard<'a> {
        PageGuard {
            guard: self.inner.lock().unwrap(),
            id: page.id,
        }
    }

    /// Borrow a page's bytes for writing.
    pub fn page_bytes_mut<'a>(&'a self, page: &Page) -> PageGuardMut<'a> {
        PageGuardMut {
            guard: self.inner.lock().unwrap(),
            id: page.id,
        }
    }

    /// Borrow a spill allocation's bytes for writing.
    pub fn spill_bytes_mut<'a>(
        &'a self,
        handle: SpillHandle,
    ) -> Result<SpillGuardMut<'a>, AllocError> {
        let guard = self.inner.lock().unwrap();
        let slot = guard.regions[handle.owner.region]
            .as_ref()
            .ok_or(AllocError::InvalidSpill)?
            .slots[handle.owner.slot as usize]
            .as_ref()
            .ok_or(AllocError::InvalidSpill)?;
        if slot.spills.get(handle.slot_index).is_none() {
            return Err(AllocError::InvalidSpill);
        }
        Ok(SpillGuardMut { guard, handle })
    }
}

/// A guard holding the allocator lock while exposing a page's bytes for
/// reading.
pub struct PageGuard<'a> {
    guard: std::sync::MutexGuard<'a, AllocatorInner>,
    id: PageId,
}

impl std::ops::Deref for PageGuard<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard.regions[self.id.region]
            .as_ref()
            .expect("page's region is still live while a guard is held")
            .slots[self.id.slot as usize]
            .as_ref()
            .expect("page's slot is still occupied while a guard is held")
            .bytes
    }
}

/// A guard holding the allocator lock while exposing a page's bytes for
/// writing.
pub struct PageGuardMut<'a> {
    guard: std::sync::MutexGuard<'a, AllocatorInner>,
    id: PageId,
}

impl std::ops::Deref for PageGuardMut<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard.regions[self.id.region]
            .as_ref()
            .expect("page's region is still live while a guard is held")
            .slots[self.id.slot as usize]
            .as_ref()
            .expect("page's slot is still occupied while a guard is held")
            .bytes
    }
}

impl std::ops::DerefMut for PageGuardMut<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.guard.regions[self.id.region]
            .as_mut()
            .expect("page's region is still live while a guard is held")
            .slots[self.id.slot as usize]
            .as_mut()
            .expect("page's slot is still occupied while a guard is held")
            .bytes
    }
}

/// A guard exposing a single spill allocation's bytes for writing. The bytes
/// live attached to the owning page's slot; see [`Allocator::zalloc`].
pub struct SpillGuardMut<'a> {
    guard: std::sync::MutexGuard<'a, AllocatorInner>,
    handle: SpillHandle,
}

impl std::ops::Deref for SpillGuardMut<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard.regions[self.handle.owner.region]
            .as_ref()
            .expect("spill owner's region is still live while a guard is held")
            .slots[self.handle.owner.slot as usize]
            .as_ref()
            .expect("spill owner's slot is still occupied while a guard is held")
            .spills[self.handle.slot_index]
            .1
    }
}

impl std::ops::DerefMut for SpillGuardMut<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.guard.regions[self.handle.owner.region]
            .as_mut()
            .expect("spill owner's region is still live while a guard is held")
            .slots[self.handle.owner.slot as usize]
            .as_mut()
            .expect("spill owner's slot is still occupied while a guard is held")
            .spills[self.handle.slot_index]
            .1
    }
}

impl Drop for Allocator {
    fn drop(&mut self) {
        let outstanding = self.outstanding_pages();
        if outstanding != 0 {
            tracing::error!(outstanding, "allocator destroyed with outstanding pages");
        }
        debug_assert_eq!(
            outstanding, 0,
            "allocator dropped with {outstanding} page(s) still outstanding"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_witness_scenario_6() {
        let a = Allocator::create(4096, 128);
        let p = a.alloc_page(1000).unwrap();
        assert_eq!(a.region_count(), 1);
        assert_eq!(a.region_bitmap(0), 0xfe);

        a.free_page(p).unwrap();
        assert_eq!(a.region_count(), 0);
    }

    #[test]
    fn zalloc_zero_bytes_is_null_sentinel() {
        let a = Allocator::create(4096, 8);
        let p = a.alloc_page(100).unwrap();
        assert!(a.zalloc(0, &p).unwrap().is_none());
        a.free_page(p).unwrap();
    }

    #[test]
    fn zalloc_spills_into_new_region_when_owner_region_full() {
        let a = Allocator::create(4096, 8);
        let p = a.alloc_page(4000).unwrap();
        assert_eq!(a.region_count(), 1);

        let handle = a.zalloc(200, &p).unwrap().unwrap();
        assert_eq!(a.region_count(), 2);
        assert_eq!(handle.len(), 200);

        {
            let mut guard = a.spill_bytes_mut(handle).unwrap();
            guard[0] = 0xAB;
        }
        assert_eq!(a.page_bytes(&p).len(), 4000);

        a.free_page(p).unwrap();
        assert_eq!(a.region_count(), 0);
    }

    #[test]
    fn alloc_page_fails_past_capacity() {
        let a = Allocator::create(4096, 1);
        let mut pages = Vec::new();
        for _ in 0..SLOTS_PER_REGION {
            pages.push(a.alloc_page(100).unwrap());
        }
        assert!(matches!(
            a.alloc_page(100),
            Err(AllocError::OutOfCapacity { .. })
        ));
        for p in pages {
            a.free_page(p).unwrap();
        }
        assert_eq!(a.region_count(), 0);
    }

    #[test]
    fn page_too_large_for_region() {
        let a = Allocator::create(4096, 8);
        assert!(matches!(
            a.alloc_page(5000),
            Err(AllocError::PageTooLarge { .. })
        ));
    }

    #[test]
    fn outstanding_pages_tracks_live_allocations() {
        let a = Allocator::create(4096, 8);
        assert_eq!(a.outstanding_pages(), 0);
        let p1 = a.alloc_page(100).unwrap();
        let p2 = a.alloc_page(100).unwrap();
        assert_eq!(a.outstanding_pages(), 2);
        a.free_page(p1).unwrap();
        assert_eq!(a.outstanding_pages(), 1);
        a.free_page(p2).unwrap();
        assert_eq!(a.outstanding_pages(), 0);
    }
}
