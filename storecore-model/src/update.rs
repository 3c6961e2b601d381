use crate::value::UpdateValue;
use crate::TxnId;
use crate::Timestamp;

/// State machine a single [`Update`] moves through. Immutable
/// once it reaches `Committed` or `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Pending,
    Prepared,
    Committed,
    Aborted,
}

/// One version of a key, written by exactly one transaction: `{ txn_id,
/// commit_ts, durable_ts, prepare_ts?, value|tombstone, state }`.
#[derive(Debug, Clone)]
pub struct Update {
    pub txn_id: TxnId,
    pub commit_ts: Option<Timestamp>,
    pub durable_ts: Option<Timestamp>,
    pub prepare_ts: Option<Timestamp>,
    pub value: UpdateValue,
    pub state: UpdateState,
}

impl Update {
    pub(crate) fn new_pending(txn_id: TxnId, value: UpdateValue) -> Self {
        Self {
            txn_id,
            commit_ts: None,
            durable_ts: None,
            prepare_ts: None,
            value,
            state: UpdateState::Pending,
        }
    }
}
