use std::collections::BTreeSet;

/// Number of fixed-size page slots carved out of each region. Chosen to match
/// the bitmap-byte witness in the test corpus (`0xfe` / `0xff`): a region's
/// occupancy fits in a single byte.
pub(crate) const SLOTS_PER_REGION: usize = 8;

/// Bitmap with all `SLOTS_PER_REGION` bits set, i.e. every slot free.
pub(crate) const ALL_FREE: u8 = 0xFF;

/// A page that has been carved out of a region's fixed-size slots.
pub(crate) struct PageSlot {
    pub bytes: Vec<u8>,
    /// `(region index, spill bytes)` for each spill allocation owned by this
    /// page. The bytes live here, attached to the owning page, while the
    /// region index records which region's capacity accounting to unwind in
    /// `free_page`.
    pub spills: Vec<(usize, Vec<u8>)>,
}

/// A contiguous byte arena carved into `SLOTS_PER_REGION` page slots, plus
/// room for spill allocations that bump-allocate from whatever room is left.
pub(crate) struct Region {
    pub capacity: usize,
    pub arena_used: usize,
    /// Bit `i` set means slot `i` is free.
    pub slot_free: u8,
    pub slots: [Option<PageSlot>; SLOTS_PER_REGION],
    /// Pages that hold a spill allocation living in this region despite their
    /// page slot living elsewhere.
    pub spill_owners: BTreeSet<(usize, u8)>,
}

impl Region {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            arena_used: 0,
            slot_free: ALL_FREE,
            slots: Default::default(),
            spill_owners: BTreeSet::new(),
        }
    }

    pub fn room(&self) -> usize {
        self.capacity.saturating_sub(self.arena_used)
    }

    pub fn is_empty(&self) -> bool {
        self.slot_free == ALL_FREE && self.spill_owners.is_empty()
    }

    pub fn first_free_slot(&self) -> Option<usize> {
        (0..SLOTS_PER_REGION).find(|i| self.slot_free & (1 << i) != 0)
    }

    pub fn occupy_slot(&mut self, slot: usize, page: PageSlot) {
        debug_assert!(self.slot_free & (1 << slot) != 0);
        self.slot_free &= !(1 << slot);
        self.arena_used += page.bytes.len();
        self.slots[slot] = Some(page);
    }

    pub fn vacate_slot(&mut self, slot: usize) -> Option<PageSlot> {
        let taken = self.slots[slot].take();
        if let Some(p) = &taken {
            self.arena_used = self.arena_used.saturating_sub(p.bytes.len());
            self.slot_free |= 1 << slot;
        }
        taken
    }
}
