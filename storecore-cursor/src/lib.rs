//! Block cursor: a batch iterator over row-store tables with raw
//! byte-string key/value format, driving the `storecore-rowstore` walk
//! and wired to `storecore-model`'s checkpoint/snapshot visibility.

mod cursor;
mod error;
mod scope;

pub use cursor::{BlockCursor, CursorKind, CursorOps, MAX_BLOCK_ITEM};
pub use error::CursorError;
pub use scope::{open_block_cursor, row_store_from_checkpoint, row_store_from_database};
