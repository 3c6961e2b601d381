//! Wiring a [`BlockCursor`] to the transactional model's visibility rules:
//! either the session's normal snapshot, or — when the configuration
//! string names one — a checkpoint's frozen view. The
//! model has no notion of row-store page layout, so this module's job is
//! entirely the handoff: read the model's visible rows for a table and
//! hand them to [`MemRowStore`] as the walk's backing order.

use storecore_model::{Checkpoint, Database, ModelError, ReadScope, Timestamp};
use storecore_rowstore::{KeyValueFormat, MemRowStore, TableKind, TableSchema};

use crate::cursor::BlockCursor;
use crate::error::CursorError;

fn raw_row_schema() -> TableSchema {
    TableSchema {
        kind: TableKind::Row,
        format: KeyValueFormat::RawBytes,
    }
}

/// Build a row store over `table`'s rows as `db` sees them under `scope`.
/// Propagates [`ModelError::PrepareConflict`] if a key's visible version
/// is a prepared update the caller doesn't own — opening a cursor over
/// such a table fails the same way a read of that key would.
pub fn row_store_from_database(
    db: &Database,
    table: &str,
    scope: ReadScope,
    rows_per_page: usize,
) -> Result<MemRowStore, ModelError> {
    let mut rows = Vec::new();
    for key in db.table_keys(table, scope) {
        if let Some(value) = db.get(table, &key, scope)? {
            rows.push((key, value));
        }
    }
    Ok(MemRowStore::new(raw_row_schema(), rows, rows_per_page))
}

/// Build a row store over `table`'s rows as `checkpoint` sees them, with
/// an optional debug read-timestamp overlaid.
pub fn row_store_from_checkpoint(
    checkpoint: &Checkpoint,
    table: &str,
    debug_read_ts: Option<Timestamp>,
    rows_per_page: usize,
) -> MemRowStore {
    let mut rows = Vec::new();
    for key in checkpoint.table_keys(table) {
        if let Some(value) = checkpoint.get_with_debug_ts(table, &key, debug_read_ts) {
            rows.push((key, value));
        }
    }
    MemRowStore::new(raw_row_schema(), rows, rows_per_page)
}

/// Open a block cursor over `table` per a parsed configuration string: a
/// `checkpoint=...` clause selects a checkpoint's frozen view; otherwise
/// a `read_timestamp=...` clause (or its absence) selects the session's
/// normal snapshot.
pub fn open_block_cursor(
    db: &Database,
    table: &str,
    cfg: &storecore_model::config::CursorConfig,
    rows_per_page: usize,
) -> Result<BlockCursor, CursorError> {
    let store: Box<dyn storecore_rowstore::RowStore> = if let Some(open) = &cfg.checkpoint {
        let checkpoint = db.checkpoint(open.name.as_deref())?;
        Box::new(row_store_from_checkpoint(
            &checkpoint,
            table,
            open.debug_read_timestamp,
            rows_per_page,
        ))
    } else {
        let scope = match cfg.read_timestamp {
            Some(ts) => ReadScope::AsOf(ts),
            None => ReadScope::Latest,
        };
        Box::new(row_store_from_database(db, table, scope, rows_per_page)?)
    };
    tracing::trace!(table, checkpoint = cfg.checkpoint.is_some(), "opened block cursor");
    BlockCursor::new(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storecore_model::config::parse_cursor_config;

    const TABLE: &str = "t";

    #[test]
    fn opens_over_the_live_database_with_latest_visibility() {
        let db = Database::new();
        let t1 = db.begin_transaction(None);
        db.insert(t1, TABLE, b"k1", b"v1".to_vec()).unwrap();
        db.commit_transaction(t1, Some(10), None).unwrap();

        let cfg = parse_cursor_config("").unwrap();
        let mut cursor = open_block_cursor(&db, TABLE, &cfg, 8).unwrap();
        let mut keys = Vec::new();
        let mut values = Vec::new();
        use crate::cursor::CursorOps;
        let n = cursor.next_raw_n(&mut keys, &mut values).unwrap();
        assert_eq!(n, 1);
        assert_eq!(keys[0], b"k1".to_vec());
        assert_eq!(values[0], b"v1".to_vec());
    }

    #[test]
    fn opens_over_a_named_checkpoint_with_its_frozen_view() {
        let db = Database::new();
        let t1 = db.begin_transaction(None);
        db.insert(t1, TABLE, b"k1", b"v1".to_vec()).unwrap();
        db.commit_transaction(t1, Some(10), None).unwrap();
        db.create_checkpoint(Some("ckpt".to_string()));

        let t2 = db.begin_transaction(None);
        db.insert(t2, TABLE, b"k2", b"v2".to_vec()).unwrap();
        db.commit_transaction(t2, Some(20), None).unwrap();

        let cfg = parse_cursor_config("checkpoint=ckpt").unwrap();
        let mut cursor = open_block_cursor(&db, TABLE, &cfg, 8).unwrap();
        let mut keys = Vec::new();
        let mut values = Vec::new();
        use crate::cursor::CursorOps;
        let n = cursor.next_raw_n(&mut keys, &mut values).unwrap();
        assert_eq!(n, 1);
        assert_eq!(keys[0], b"k1".to_vec());
    }

    #[test]
    fn opening_over_a_prepared_update_surfaces_a_prepare_conflict() {
        let db = Database::new();
        let t1 = db.begin_transaction(None);
        db.insert(t1, TABLE, b"k1", b"v1".to_vec()).unwrap();
        db.prepare_transaction(t1, 10).unwrap();

        let cfg = parse_cursor_config("").unwrap();
        let result = open_block_cursor(&db, TABLE, &cfg, 8);
        assert!(matches!(
            result,
            Err(CursorError::Model(ModelError::PrepareConflict))
        ));
    }
}
