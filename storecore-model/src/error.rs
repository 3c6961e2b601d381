use thiserror::Error;

use crate::Timestamp;

/// Errors surfaced by the transactional KV model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The visible candidate for a read is a prepared, not-yet-committed
    /// update belonging to another transaction.
    #[error("prepare conflict on key")]
    PrepareConflict,
    /// A write lost a race with another transaction's commit on the same
    /// key and was rolled back.
    #[error("write conflict, transaction rolled back")]
    Rollback,
    /// No checkpoint is registered under the requested name.
    #[error("no checkpoint named {0:?}")]
    NoSuchCheckpoint(String),
    /// A transaction operation was attempted from a state that doesn't
    /// permit it (e.g. writing to a prepared or committed transaction).
    /// Surfaced to callers as the model's abort condition.
    #[error("illegal transaction state transition: {0}")]
    Abort(String),
    /// A commit violated the `commit_ts >= prepare_ts` rule or the
    /// stable-ts barrier on a prepared transaction's commit.
    #[error("commit_ts {commit_ts:?} is not permitted for this transaction: {reason}")]
    InvalidCommitTimestamp { commit_ts: Timestamp, reason: &'static str },
    /// A boundary configuration string failed to parse.
    #[error("invalid configuration string: {0}")]
    InvalidConfig(String),
}
