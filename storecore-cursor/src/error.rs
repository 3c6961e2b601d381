use thiserror::Error;

/// Errors surfaced at the cursor boundary.
#[derive(Debug, Error)]
pub enum CursorError {
    /// Construction validation failed, or an unsupported operation was
    /// invoked on a cursor kind that doesn't implement it.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The underlying walk is exhausted in the requested direction, and
    /// this was the batch's first advance (not just an intra-page stop).
    #[error("no such row")]
    NotFound,
    /// The visible candidate for the next row is a prepared, uncommitted
    /// update, and this was the batch's first advance.
    #[error("prepare conflict")]
    PrepareConflict,
    /// The enclosing transaction was rolled back mid-walk.
    #[error("rollback")]
    Rollback,
    /// The checkpoint or table named in a configuration string doesn't
    /// exist, or the string itself is malformed.
    #[error(transparent)]
    Model(#[from] storecore_model::ModelError),
}

impl From<storecore_rowstore::RowStoreError> for CursorError {
    fn from(e: storecore_rowstore::RowStoreError) -> Self {
        match e {
            storecore_rowstore::RowStoreError::NotFound => CursorError::NotFound,
            storecore_rowstore::RowStoreError::PrepareConflict => CursorError::PrepareConflict,
            storecore_rowstore::RowStoreError::Rollback => CursorError::Rollback,
        }
    }
}
