//! The block cursor: a batch iterator restricted to row-store tables with
//! raw byte-string key/value format, holding a cursor over the external
//! [`storecore_rowstore::RowStore`] collaborator and fast-pathing
//! same-page steps rather than re-resolving position on every call.

use storecore_rowstore::{Direction, RowStore, RowStoreError, StepOutcome, TableSchema};

use crate::error::CursorError;

/// Upper bound on rows produced by a single `next_raw_n`/`prev_raw_n`
/// call. Chosen as a conservative batch size for a cursor holding the
/// enclosing transaction's snapshot open across the call; not specified
/// by name elsewhere, so kept as an internal constant rather than part
/// of the public contract.
pub const MAX_BLOCK_ITEM: usize = 1024;

/// The full cursor capability set a session can dispatch to dynamically.
/// [`BlockCursor`] is the only variant this crate implements; the batch
/// operations are its whole purpose, so the single-row and write
/// operations return [`CursorError::InvalidArgument`] rather than
/// pretending to support a write path this crate doesn't have.
pub trait CursorOps {
    fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, CursorError>;
    fn prev(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, CursorError>;
    fn next_raw_n(
        &mut self,
        keys: &mut Vec<Vec<u8>>,
        values: &mut Vec<Vec<u8>>,
    ) -> Result<usize, CursorError>;
    fn prev_raw_n(
        &mut self,
        keys: &mut Vec<Vec<u8>>,
        values: &mut Vec<Vec<u8>>,
    ) -> Result<usize, CursorError>;
    fn search(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, CursorError>;
    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), CursorError>;
    fn remove(&mut self, key: &[u8]) -> Result<(), CursorError>;
    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), CursorError>;
    fn close(self: Box<Self>);
}

/// The tagged union of cursor kinds a session can open. Only `Block` is
/// built here; the others are named to keep the capability set's shape
/// visible without faking support for access methods this crate never
/// implements.
pub enum CursorKind {
    Btree,
    Block(BlockCursor),
    Lsm,
}

/// A batch iterator over a row-store table with raw byte-string
/// key/value format. Drives a [`RowStore`] one row at a time,
/// fast-pathing the rest of each batch to intra-page steps.
pub struct BlockCursor {
    store: Box<dyn RowStore>,
    /// Count of rows whose key the walk flagged as requiring a copy —
    /// tracked so the key materialization policy is an observable
    /// invariant rather than an invisible optimization with no effect in
    /// a crate where every key is already an owned `Vec<u8>`.
    keys_materialized: u64,
    key_set: bool,
    value_set: bool,
}

impl BlockCursor {
    /// Open a cursor over `store`. Rejects tables that aren't row
    /// stores with raw byte-string keys/values.
    pub fn new(store: Box<dyn RowStore>) -> Result<Self, CursorError> {
        let schema = store.schema();
        if !schema.is_block_cursor_compatible() {
            return Err(CursorError::InvalidArgument(
                "table is not a row store with raw byte-string key/value format",
            ));
        }
        Ok(Self {
            store,
            keys_materialized: 0,
            key_set: false,
            value_set: false,
        })
    }

    pub fn schema(&self) -> TableSchema {
        self.store.schema()
    }

    /// Rows whose key required materialization into cursor storage
    /// since construction.
    pub fn keys_materialized(&self) -> u64 {
        self.keys_materialized
    }

    /// Whether a single-row key is currently bound (only meaningful
    /// between a [`CursorOps::next`]/[`CursorOps::prev`] call and the
    /// next operation on this cursor — a batch call always clears both
    /// flags before returning).
    pub fn key_is_set(&self) -> bool {
        self.key_set
    }

    pub fn value_is_set(&self) -> bool {
        self.value_set
    }

    fn batch(
        &mut self,
        dir: Direction,
        keys: &mut Vec<Vec<u8>>,
        values: &mut Vec<Vec<u8>>,
    ) -> Result<usize, CursorError> {
        keys.clear();
        values.clear();
        self.key_set = false;
        self.value_set = false;

        let mut n = 0usize;
        let mut first = true;
        while n < MAX_BLOCK_ITEM {
            let allow_cross_page = first;
            match self.store.advance(dir, allow_cross_page) {
                Ok(Some(step)) => {
                    let StepOutcome {
                        key,
                        value,
                        key_copy_required,
                        ..
                    } = step;
                    if key_copy_required {
                        self.keys_materialized += 1;
                    }
                    keys.push(key);
                    values.push(value);
                    n += 1;
                    first = false;
                }
                Ok(None) => break, // intra-page crossing disallowed: clean stop
                Err(RowStoreError::NotFound) | Err(RowStoreError::PrepareConflict) if !first => {
                    break; // clean end of batch, not an error
                }
                Err(e) => {
                    self.key_set = false;
                    self.value_set = false;
                    return Err(e.into());
                }
            }
        }
        // Position holds on the last yielded row; "set" flags are cleared
        // so the caller reads only through the returned arrays.
        self.key_set = false;
        self.value_set = false;
        Ok(n)
    }
}

impl BlockCursor {
    /// Advance exactly one row in `dir`, always allowed to cross a page
    /// boundary — the single-row path has no intra-page restriction,
    /// that fast path only applies inside a batch call.
    fn step_one(&mut self, dir: Direction) -> Result<Option<(Vec<u8>, Vec<u8>)>, CursorError> {
        self.key_set = false;
        self.value_set = false;
        match self.store.advance(dir, true) {
            Ok(Some(step)) => {
                if step.key_copy_required {
                    self.keys_materialized += 1;
                }
                Ok(Some((step.key, step.value)))
            }
            Ok(None) => unreachable!("allow_cross_page is true"),
            Err(RowStoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CursorOps for BlockCursor {
    fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, CursorError> {
        self.step_one(Direction::Forward)
    }

    fn prev(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, CursorError> {
        self.step_one(Direction::Reverse)
    }

    fn next_raw_n(
        &mut self,
        keys: &mut Vec<Vec<u8>>,
        values: &mut Vec<Vec<u8>>,
    ) -> Result<usize, CursorError> {
        self.batch(Direction::Forward, keys, values)
    }

    fn prev_raw_n(
        &mut self,
        keys: &mut Vec<Vec<u8>>,
        values: &mut Vec<Vec<u8>>,
    ) -> Result<usize, CursorError> {
        self.batch(Direction::Reverse, keys, values)
    }

    fn search(&mut self, _key: &[u8]) -> Result<Option<Vec<u8>>, CursorError> {
        Err(CursorError::InvalidArgument(
            "block cursor supports only next_raw_n/prev_raw_n batch iteration",
        ))
    }

    fn insert(&mut self, _key: &[u8], _value: &[u8]) -> Result<(), CursorError> {
        Err(CursorError::InvalidArgument(
            "block cursor has no write path",
        ))
    }

    fn remove(&mut self, _key: &[u8]) -> Result<(), CursorError> {
        Err(CursorError::InvalidArgument(
            "block cursor has no write path",
        ))
    }

    fn update(&mut self, _key: &[u8], _value: &[u8]) -> Result<(), CursorError> {
        Err(CursorError::InvalidArgument(
            "block cursor has no write path",
        ))
    }

    fn close(self: Box<Self>) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storecore_rowstore::{KeyValueFormat, MemRowStore, TableKind};

    fn raw_rows_schema() -> TableSchema {
        TableSchema {
            kind: TableKind::Row,
            format: KeyValueFormat::RawBytes,
        }
    }

    fn rows(n: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        (0..n)
            .map(|i| (format!("k{i:04}").into_bytes(), format!("v{i}").into_bytes()))
            .collect()
    }

    #[test]
    fn construction_rejects_incompatible_schema() {
        let bad_schema = TableSchema {
            kind: TableKind::Column,
            format: KeyValueFormat::RawBytes,
        };
        let store = MemRowStore::new(bad_schema, Vec::new(), 8);
        assert!(matches!(
            BlockCursor::new(Box::new(store)),
            Err(CursorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn next_raw_n_yields_rows_in_ascending_order_within_one_page() {
        let store = MemRowStore::new(raw_rows_schema(), rows(5), 8);
        let mut cursor = BlockCursor::new(Box::new(store)).unwrap();
        let mut keys = Vec::new();
        let mut values = Vec::new();
        let n = cursor.next_raw_n(&mut keys, &mut values).unwrap();
        assert_eq!(n, 5);
        assert_eq!(keys.len(), n);
        assert_eq!(values.len(), n);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn next_raw_n_stops_at_a_page_boundary_after_crossing_into_the_first_page() {
        let store = MemRowStore::new(raw_rows_schema(), rows(20), 4);
        let mut cursor = BlockCursor::new(Box::new(store)).unwrap();
        let mut keys = Vec::new();
        let mut values = Vec::new();
        let n = cursor.next_raw_n(&mut keys, &mut values).unwrap();
        assert_eq!(n, 4);
        assert_eq!(keys, vec![b"k0000".to_vec(), b"k0001".to_vec(), b"k0002".to_vec(), b"k0003".to_vec()]);
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn prev_raw_n_yields_rows_in_descending_order() {
        let store = MemRowStore::new(raw_rows_schema(), rows(3), 8);
        let mut cursor = BlockCursor::new(Box::new(store)).unwrap();
        let mut keys = Vec::new();
        let mut values = Vec::new();
        let n = cursor.prev_raw_n(&mut keys, &mut values).unwrap();
        assert_eq!(n, 3);
        assert!(keys.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn empty_table_reports_not_found_on_the_first_advance() {
        let store = MemRowStore::new(raw_rows_schema(), Vec::new(), 8);
        let mut cursor = BlockCursor::new(Box::new(store)).unwrap();
        let mut keys = Vec::new();
        let mut values = Vec::new();
        assert!(matches!(
            cursor.next_raw_n(&mut keys, &mut values),
            Err(CursorError::NotFound)
        ));
    }

    #[test]
    fn repeated_calls_resume_from_the_held_position() {
        let store = MemRowStore::new(raw_rows_schema(), rows(12), 4);
        let mut cursor = BlockCursor::new(Box::new(store)).unwrap();
        let mut keys = Vec::new();
        let mut values = Vec::new();

        let first = cursor.next_raw_n(&mut keys, &mut values).unwrap();
        assert_eq!(first, 4);
        let first_batch = keys.clone();

        let second = cursor.next_raw_n(&mut keys, &mut values).unwrap();
        assert_eq!(second, 4);
        assert!(keys.iter().all(|k| !first_batch.contains(k)));
    }

    #[test]
    fn key_materialization_counter_only_advances_at_page_boundaries() {
        let store = MemRowStore::new(raw_rows_schema(), rows(10), 4);
        let mut cursor = BlockCursor::new(Box::new(store)).unwrap();
        let mut keys = Vec::new();
        let mut values = Vec::new();
        cursor.next_raw_n(&mut keys, &mut values).unwrap();
        // Only the first row of a 4-row page requires a key copy.
        assert_eq!(cursor.keys_materialized(), 1);
    }
}
