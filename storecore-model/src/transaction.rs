use crate::Timestamp;
use crate::TxnId;

/// Transaction state machine: `active -> (prepared?) -> {committed |
/// aborted}`. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Prepared,
    Committed,
    Aborted,
}

/// `{ id, read_ts, state, writes[], commit_ts?, durable_ts?, prepare_ts? }`.
/// Lives in [`crate::Database`]'s active-transaction table until it
/// reaches a terminal state, at which point it is dropped: its Updates
/// carry the durable record of what happened.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TxnId,
    /// `None` means this is a non-timestamped transaction reading latest.
    pub read_ts: Option<Timestamp>,
    pub state: TxnState,
    /// `(table, key)` pairs this transaction has written, in write order.
    pub writes: Vec<(String, Vec<u8>)>,
    pub commit_ts: Option<Timestamp>,
    pub durable_ts: Option<Timestamp>,
    pub prepare_ts: Option<Timestamp>,
}

impl Transaction {
    pub(crate) fn new(id: TxnId, read_ts: Option<Timestamp>) -> Self {
        Self {
            id,
            read_ts,
            state: TxnState::Active,
            writes: Vec::new(),
            commit_ts: None,
            durable_ts: None,
            prepare_ts: None,
        }
    }
}
