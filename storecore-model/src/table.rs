use std::collections::BTreeMap;

use crate::update::{Update, UpdateState};
use crate::TxnId;

/// A key's version chain: committed updates ordered by
/// `commit_ts`, plus at most one pending (not yet committed or aborted)
/// update. Only one transaction may hold the pending slot at a time —
/// [`Table::write`] enforces that as the write-conflict rule.
#[derive(Debug, Default)]
pub(crate) struct KeyHistory {
    /// Sorted ascending by `commit_ts`; invariant I6 forbids duplicates.
    pub committed: Vec<Update>,
    pub pending: Option<Update>,
}

impl KeyHistory {
    /// The committed update with the greatest `commit_ts <= bound`
    /// (`bound = None` means unbounded / latest).
    pub fn committed_as_of(&self, bound: Option<u64>) -> Option<&Update> {
        self.committed
            .iter()
            .rev()
            .find(|u| bound.map_or(true, |b| u.commit_ts.unwrap_or(0) <= b))
    }
}

/// Named mapping from key to key history. Keys are raw byte strings;
/// `BTreeMap` gives lexicographic iteration for free, matching the
/// cursor's ordering contract.
#[derive(Debug, Default)]
pub(crate) struct Table {
    pub rows: BTreeMap<Vec<u8>, KeyHistory>,
}

impl Table {
    pub fn key_history(&self, key: &[u8]) -> Option<&KeyHistory> {
        self.rows.get(key)
    }

    pub fn key_history_mut(&mut self, key: &[u8]) -> &mut KeyHistory {
        self.rows.entry(key.to_vec()).or_default()
    }

    /// Commit `txn_id`'s pending update on `key`. Caller has already
    /// validated the transaction-level rules; this only enforces I6.
    pub fn commit_pending(
        &mut self,
        key: &[u8],
        txn_id: TxnId,
        commit_ts: u64,
        durable_ts: u64,
    ) -> Result<(), &'static str> {
        let history = self.rows.entry(key.to_vec()).or_default();
        let Some(mut update) = history.pending.take() else {
            return Ok(());
        };
        debug_assert_eq!(update.txn_id, txn_id);
        if history.committed.iter().any(|u| u.commit_ts == Some(commit_ts)) {
            history.pending = Some(update);
            return Err("duplicate commit_ts for this key");
        }
        update.commit_ts = Some(commit_ts);
        update.durable_ts = Some(durable_ts);
        update.state = UpdateState::Committed;
        let pos = history
            .committed
            .partition_point(|u| u.commit_ts.unwrap_or(0) <= commit_ts);
        history.committed.insert(pos, update);
        Ok(())
    }

    /// Discard `txn_id`'s pending update on `key` (rollback).
    pub fn abort_pending(&mut self, key: &[u8], txn_id: TxnId) {
        if let Some(history) = self.rows.get_mut(key) {
            if history.pending.as_ref().is_some_and(|u| u.txn_id == txn_id) {
                history.pending = None;
            }
        }
    }
}
