//! The row-store/B-tree walk `storecore-cursor` drives. The on-disk page
//! format a real B-tree pager
//! would use is out of scope here — this crate keeps only the walk and
//! array primitives the block cursor needs: raw byte-string key/value
//! slots, and a forward/reverse step that reports page-boundary
//! crossings so the cursor can apply its own intra-page fast path.

use std::cmp::Ordering;

use thiserror::Error;

/// Direction of a single-row advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Errors surfaced by a row-store walk.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RowStoreError {
    /// Iteration is exhausted in the requested direction.
    #[error("no such row")]
    NotFound,
    /// The visible candidate for the next row is a prepared, uncommitted
    /// update (propagated from the transactional model).
    #[error("prepare conflict")]
    PrepareConflict,
    /// The enclosing transaction was rolled back mid-walk.
    #[error("rollback")]
    Rollback,
}

/// What kind of access method backs a table. The cursor only supports
/// [`TableKind::Row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Row,
    Column,
    Lsm,
}

/// A table's configured key/value marshalling. The cursor only supports
/// [`KeyValueFormat::RawBytes`]; anything else is cursor key/value
/// marshalling this crate doesn't implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValueFormat {
    RawBytes,
    Custom,
}

/// A table's access-method/format pair, checked at cursor construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub kind: TableKind,
    pub format: KeyValueFormat,
}

impl TableSchema {
    pub fn is_block_cursor_compatible(&self) -> bool {
        matches!(self.kind, TableKind::Row) && matches!(self.format, KeyValueFormat::RawBytes)
    }
}

/// One step of a row-store walk: the yielded row plus the bookkeeping
/// flags the cursor needs to decide whether to materialize the key and
/// whether a page boundary was crossed to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Set when the underlying page walk had to copy this key rather than
    /// hand back a pointer into a still-live page — the cursor only
    /// materializes into its own storage when this is set.
    pub key_copy_required: bool,
    /// Set when this step moved onto a different page than the one the
    /// cursor was previously positioned on.
    pub crossed_page: bool,
}

/// The external row-store/B-tree iteration collaborator. Drives a
/// forward or reverse walk one row at a time from the store's current
/// position.
pub trait RowStore: Send + Sync {
    fn schema(&self) -> TableSchema;

    /// Attempt to advance one row in `dir`. When `allow_cross_page` is
    /// `false` and the next row lives on a different page than the
    /// cursor's current position, this returns `Ok(None)` without moving
    /// — the intra-page fast path's stopping point, not an error.
    fn advance(
        &mut self,
        dir: Direction,
        allow_cross_page: bool,
    ) -> Result<Option<StepOutcome>, RowStoreError>;
}

/// Reference row store: an in-memory, key-sorted row set split into
/// fixed-size simulated pages, positioned by index. Exercises the same
/// walk contract a real B-tree pager would, without the page encoding —
/// intended for tests of [`storecore-cursor`] and as a template for a real
/// pager-backed implementation.
pub struct MemRowStore {
    schema: TableSchema,
    rows: Vec<(Vec<u8>, Vec<u8>)>,
    rows_per_page: usize,
    pos: Option<usize>,
}

impl MemRowStore {
    /// `rows` must already be sorted ascending by key (as a real B-tree's
    /// leaves are); `rows_per_page` simulates the pager's page boundaries
    /// for `crossed_page` bookkeeping.
    pub fn new(schema: TableSchema, rows: Vec<(Vec<u8>, Vec<u8>)>, rows_per_page: usize) -> Self {
        debug_assert!(
            rows.windows(2).all(|w| w[0].0.cmp(&w[1].0) == Ordering::Less),
            "rows must be sorted ascending by key with no duplicates"
        );
        Self {
            schema,
            rows,
            rows_per_page: rows_per_page.max(1),
            pos: None,
        }
    }

    fn page_of(&self, idx: usize) -> usize {
        idx / self.rows_per_page
    }

    /// Reset to an unpositioned state, so the next advance re-enters from
    /// the start (forward) or end (reverse).
    pub fn reset(&mut self) {
        self.pos = None;
    }
}

impl RowStore for MemRowStore {
    fn schema(&self) -> TableSchema {
        self.schema
    }

    fn advance(
        &mut self,
        dir: Direction,
        allow_cross_page: bool,
    ) -> Result<Option<StepOutcome>, RowStoreError> {
        let next_idx = match (self.pos, dir) {
            (None, Direction::Forward) => Some(0),
            (None, Direction::Reverse) => self.rows.len().checked_sub(1),
            (Some(i), Direction::Forward) => i.checked_add(1).filter(|&n| n < self.rows.len()),
            (Some(i), Direction::Reverse) => i.checked_sub(1),
        };
        let Some(next_idx) = next_idx else {
            return Err(RowStoreError::NotFound);
        };

        let crossed_page = match self.pos {
            None => true,
            Some(prev) => self.page_of(prev) != self.page_of(next_idx),
        };
        if crossed_page && !allow_cross_page {
            return Ok(None);
        }

        let key_copy_required = next_idx % self.rows_per_page == 0;
        self.pos = Some(next_idx);
        let (key, value) = self.rows[next_idx].clone();
        Ok(Some(StepOutcome {
            key,
            value,
            key_copy_required,
            crossed_page,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        (0..n)
            .map(|i| (format!("k{i:04}").into_bytes(), format!("v{i}").into_bytes()))
            .collect()
    }

    fn schema() -> TableSchema {
        TableSchema {
            kind: TableKind::Row,
            format: KeyValueFormat::RawBytes,
        }
    }

    #[test]
    fn forward_walk_yields_rows_in_order() {
        let mut store = MemRowStore::new(schema(), rows(5), 8);
        let mut seen = Vec::new();
        loop {
            match store.advance(Direction::Forward, true) {
                Ok(Some(step)) => seen.push(step.key),
                Ok(None) => unreachable!("allow_cross_page is true"),
                Err(RowStoreError::NotFound) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(seen.len(), 5);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn reverse_walk_yields_rows_in_reverse_order() {
        let mut store = MemRowStore::new(schema(), rows(5), 8);
        let mut seen = Vec::new();
        while let Ok(Some(step)) = store.advance(Direction::Reverse, true) {
            seen.push(step.key);
        }
        assert_eq!(seen.len(), 5);
        assert!(seen.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn disallowing_cross_page_stops_cleanly_at_the_boundary() {
        let mut store = MemRowStore::new(schema(), rows(20), 4);
        // First advance is allowed to cross into page 0.
        assert!(store.advance(Direction::Forward, true).unwrap().is_some());
        let mut within_page = 1;
        while let Some(_step) = store.advance(Direction::Forward, false).unwrap() {
            within_page += 1;
        }
        assert_eq!(within_page, 4);
    }

    #[test]
    fn key_copy_required_only_at_page_boundaries() {
        let mut store = MemRowStore::new(schema(), rows(10), 4);
        let first = store.advance(Direction::Forward, true).unwrap().unwrap();
        assert!(first.key_copy_required);
        let second = store.advance(Direction::Forward, true).unwrap().unwrap();
        assert!(!second.key_copy_required);
    }

    #[test]
    fn schema_rejects_non_row_or_non_raw_tables() {
        let column = TableSchema {
            kind: TableKind::Column,
            format: KeyValueFormat::RawBytes,
        };
        assert!(!column.is_block_cursor_compatible());
        let custom_format = TableSchema {
            kind: TableKind::Row,
            format: KeyValueFormat::Custom,
        };
        assert!(!custom_format.is_block_cursor_compatible());
        assert!(schema().is_block_cursor_compatible());
    }
}
