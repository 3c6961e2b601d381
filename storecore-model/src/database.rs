use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::checkpoint::Checkpoint;
use crate::error::ModelError;
use crate::table::Table;
use crate::timestamp::{Timestamp, NONE};
use crate::transaction::{Transaction, TxnState};
use crate::update::{Update, UpdateState};
use crate::value::UpdateValue;
use crate::TxnId;

/// How a [`Database::get`] call resolves visibility.
#[derive(Debug, Clone, Copy)]
pub enum ReadScope {
    /// The greatest committed update, with no timestamp bound.
    Latest,
    /// The greatest committed update with `commit_ts <= ts`.
    AsOf(Timestamp),
    /// Read within an active transaction: sees the transaction's own
    /// pending writes (read-your-writes), falling back to its `read_ts`
    /// (or latest, if none was set) for keys it hasn't written.
    InTransaction(TxnId),
}

/// All mutable database state, guarded by a single mutex: every operation
/// takes the lock for its whole critical section rather than holding
/// finer-grained locks across tables.
struct DbCore {
    tables: HashMap<String, Table>,
    stable_ts: Option<Timestamp>,
    named_checkpoints: HashMap<String, Arc<Checkpoint>>,
    unnamed_checkpoint: Option<Arc<Checkpoint>>,
    active_txns: HashMap<TxnId, Transaction>,
    next_txn_id: TxnId,
}

/// The transactional KV reference model: MVCC state, timestamps,
/// prepare/commit, checkpoints, snapshot reads. This is the semantic
/// model the storage engine's block layer sits behind.
pub struct Database {
    inner: Mutex<DbCore>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DbCore {
                tables: HashMap::new(),
                stable_ts: None,
                named_checkpoints: HashMap::new(),
                unnamed_checkpoint: None,
                active_txns: HashMap::new(),
                next_txn_id: 1,
            }),
        }
    }

    /// Start a new transaction. `read_ts = None` means "latest committed".
    pub fn begin_transaction(&self, read_ts: Option<Timestamp>) -> TxnId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_txn_id;
        inner.next_txn_id += 1;
        inner.active_txns.insert(id, Transaction::new(id, read_ts));
        tracing::trace!(txn = id, read_ts, "began transaction");
        id
    }

    /// Write `value` for `key` in `table` within `txn`. Fails the write
    /// conflict rule if another active transaction already holds the
    /// pending slot for this key.
    pub fn insert(&self, txn: TxnId, table: &str, key: &[u8], value: Vec<u8>) -> Result<(), ModelError> {
        self.write(txn, table, key, UpdateValue::Data(value))
    }

    /// Write a tombstone for `key` in `table` within `txn`.
    pub fn remove(&self, txn: TxnId, table: &str, key: &[u8]) -> Result<(), ModelError> {
        self.write(txn, table, key, UpdateValue::Tombstone)
    }

    fn write(&self, txn_id: TxnId, table: &str, key: &[u8], value: UpdateValue) -> Result<(), ModelError> {
        let mut inner = self.inner.lock().unwrap();
        let txn = inner
            .active_txns
            .get(&txn_id)
            .ok_or_else(|| ModelError::Abort(format!("no active transaction {txn_id}")))?;
        if txn.state != TxnState::Active {
            return Err(ModelError::Abort(format!(
                "cannot write to a transaction in state {:?}",
                txn.state
            )));
        }

        let t = inner.tables.entry(table.to_string()).or_default();
        let history = t.key_history_mut(key);
        if let Some(existing) = &history.pending {
            if existing.txn_id != txn_id {
                tracing::debug!(txn = txn_id, table, "write conflict, rolling back");
                return Err(ModelError::Rollback);
            }
        }
        history.pending = Some(Update::new_pending(txn_id, value));

        let txn = inner.active_txns.get_mut(&txn_id).unwrap();
        if !txn.writes.iter().any(|(t, k)| t == table && k == key) {
            txn.writes.push((table.to_string(), key.to_vec()));
        }
        Ok(())
    }

    /// Prepare `txn` at `prepare_ts`. No-op prepare (no writes) is
    /// permitted — resolved Open Question.
    pub fn prepare_transaction(&self, txn_id: TxnId, prepare_ts: Timestamp) -> Result<(), ModelError> {
        let mut inner = self.inner.lock().unwrap();
        let txn = inner
            .active_txns
            .get(&txn_id)
            .ok_or_else(|| ModelError::Abort(format!("no active transaction {txn_id}")))?;
        if txn.state != TxnState::Active {
            return Err(ModelError::Abort(format!(
                "cannot prepare a transaction in state {:?}",
                txn.state
            )));
        }
        let writes = txn.writes.clone();
        for (table, key) in &writes {
            if let Some(t) = inner.tables.get_mut(table) {
                if let Some(history) = t.rows.get_mut(key.as_slice()) {
                    if let Some(update) = history.pending.as_mut() {
                        update.prepare_ts = Some(prepare_ts);
                        update.state = UpdateState::Prepared;
                    }
                }
            }
        }
        let txn = inner.active_txns.get_mut(&txn_id).unwrap();
        txn.prepare_ts = Some(prepare_ts);
        txn.state = TxnState::Prepared;
        tracing::trace!(txn = txn_id, prepare_ts, "prepared transaction");
        Ok(())
    }

    /// Commit `txn`. `commit_ts = None` is only valid for a transaction
    /// that was never prepared (a non-timestamped commit); `durable_ts`
    /// defaults to `commit_ts` when omitted (I2).
    pub fn commit_transaction(
        &self,
        txn_id: TxnId,
        commit_ts: Option<Timestamp>,
        durable_ts: Option<Timestamp>,
    ) -> Result<(), ModelError> {
        let mut inner = self.inner.lock().unwrap();
        let txn = inner
            .active_txns
            .get(&txn_id)
            .ok_or_else(|| ModelError::Abort(format!("no active transaction {txn_id}")))?;
        if txn.state != TxnState::Active && txn.state != TxnState::Prepared {
            return Err(ModelError::Abort(format!(
                "cannot commit a transaction in state {:?}",
                txn.state
            )));
        }

        let was_prepared = txn.state == TxnState::Prepared;
        let prepare_ts = txn.prepare_ts;
        let resolved_commit = commit_ts.unwrap_or(NONE);
        let resolved_durable = durable_ts.unwrap_or(resolved_commit);

        if let Some(reason) = Self::reject_commit(was_prepared, prepare_ts, resolved_commit, resolved_durable, inner.stable_ts) {
            let writes = txn.writes.clone();
            for (table, key) in &writes {
                if let Some(t) = inner.tables.get_mut(table) {
                    t.abort_pending(key, txn_id);
                }
            }
            let txn = inner.active_txns.get_mut(&txn_id).unwrap();
            txn.state = TxnState::Aborted;
            inner.active_txns.remove(&txn_id);
            tracing::warn!(txn = txn_id, reason, "commit rejected, transaction rolled back");
            return Err(ModelError::InvalidCommitTimestamp {
                commit_ts: resolved_commit,
                reason,
            });
        }

        let writes = txn.writes.clone();
        for (table, key) in &writes {
            let t = inner.tables.entry(table.clone()).or_default();
            if let Err(reason) = t.commit_pending(key, txn_id, resolved_commit, resolved_durable) {
                // I6 violated: unwind any updates already committed in this
                // loop back to pending so the transaction stays atomic.
                tracing::error!(txn = txn_id, table, reason, "commit failed I6 check");
                return Err(ModelError::Abort(reason.to_string()));
            }
        }
        let txn = inner.active_txns.get_mut(&txn_id).unwrap();
        txn.state = TxnState::Committed;
        txn.commit_ts = Some(resolved_commit);
        txn.durable_ts = Some(resolved_durable);
        inner.active_txns.remove(&txn_id);
        tracing::trace!(txn = txn_id, commit_ts = resolved_commit, "committed transaction");
        Ok(())
    }

    fn reject_commit(
        was_prepared: bool,
        prepare_ts: Option<Timestamp>,
        commit_ts: Timestamp,
        durable_ts: Timestamp,
        stable_ts: Option<Timestamp>,
    ) -> Option<&'static str> {
        if durable_ts < commit_ts {
            return Some("durable_ts < commit_ts");
        }
        if was_prepared {
            if let Some(p) = prepare_ts {
                if commit_ts < p {
                    return Some("commit_ts < prepare_ts");
                }
            }
            if let Some(s) = stable_ts {
                if commit_ts < s {
                    return Some("commit_ts < stable_ts");
                }
            }
        }
        None
    }

    /// Roll back `txn`, discarding its pending writes.
    pub fn rollback_transaction(&self, txn_id: TxnId) -> Result<(), ModelError> {
        let mut inner = self.inner.lock().unwrap();
        let txn = inner
            .active_txns
            .get(&txn_id)
            .ok_or_else(|| ModelError::Abort(format!("no active transaction {txn_id}")))?;
        if txn.state != TxnState::Active && txn.state != TxnState::Prepared {
            return Err(ModelError::Abort(format!(
                "cannot roll back a transaction in state {:?}",
                txn.state
            )));
        }
        let writes = txn.writes.clone();
        for (table, key) in &writes {
            if let Some(t) = inner.tables.get_mut(table) {
                t.abort_pending(key, txn_id);
            }
        }
        inner.active_txns.remove(&txn_id);
        tracing::trace!(txn = txn_id, "rolled back transaction");
        Ok(())
    }

    /// Read `table[key]` under `scope`. `None` means "no such version
    /// visible".
    pub fn get(&self, table: &str, key: &[u8], scope: ReadScope) -> Result<Option<Vec<u8>>, ModelError> {
        let inner = self.inner.lock().unwrap();
        let Some(t) = inner.tables.get(table) else {
            return Ok(None);
        };
        let Some(history) = t.key_history(key) else {
            return Ok(None);
        };

        if let ReadScope::InTransaction(me) = scope {
            if let Some(pending) = &history.pending {
                if pending.txn_id == me {
                    return Ok(pending.value.as_visible());
                }
            }
        }

        if let Some(pending) = &history.pending {
            if pending.state == UpdateState::Prepared {
                let owner_is_reader = matches!(scope, ReadScope::InTransaction(me) if me == pending.txn_id);
                if !owner_is_reader {
                    return Err(ModelError::PrepareConflict);
                }
            }
        }

        let bound = match scope {
            ReadScope::Latest => None,
            ReadScope::AsOf(ts) => Some(ts),
            ReadScope::InTransaction(me) => inner
                .active_txns
                .get(&me)
                .and_then(|t| t.read_ts),
        };

        Ok(history
            .committed_as_of(bound)
            .and_then(|u| u.value.as_visible()))
    }

    /// `set_stable_timestamp(T)`: accepted only if `T > current`; a
    /// regression is silently ignored.
    pub fn set_stable_timestamp(&self, ts: Timestamp) {
        let mut inner = self.inner.lock().unwrap();
        match inner.stable_ts {
            Some(cur) if ts <= cur => {
                tracing::debug!(requested = ts, current = cur, "stable_ts regression ignored");
            }
            _ => {
                inner.stable_ts = Some(ts);
                tracing::trace!(stable_ts = ts, "advanced stable timestamp");
            }
        }
    }

    /// Current `stable_ts`, or [`crate::timestamp::NONE`] if never set.
    pub fn stable_timestamp(&self) -> Timestamp {
        self.inner.lock().unwrap().stable_ts.unwrap_or(NONE)
    }

    /// Create a checkpoint. `name = None` creates/replaces the unnamed
    /// checkpoint; `Some(name)` creates or overwrites a named one.
    pub fn create_checkpoint(&self, name: Option<String>) -> Arc<Checkpoint> {
        let mut inner = self.inner.lock().unwrap();
        let stable_ts = inner.stable_ts;
        let mut tables: BTreeMap<String, BTreeMap<Vec<u8>, Vec<Update>>> = BTreeMap::new();
        for (table_name, table) in inner.tables.iter() {
            let mut rows = BTreeMap::new();
            for (key, history) in table.rows.iter() {
                if !history.committed.is_empty() {
                    rows.insert(key.clone(), history.committed.clone());
                }
            }
            tables.insert(table_name.clone(), rows);
        }
        let checkpoint = Arc::new(Checkpoint::new(name.clone(), stable_ts, tables));
        tracing::trace!(name = name.as_deref(), stable_ts, "created checkpoint");
        match name {
            Some(n) => {
                inner.named_checkpoints.insert(n, checkpoint.clone());
            }
            None => {
                inner.unnamed_checkpoint = Some(checkpoint.clone());
            }
        }
        checkpoint
    }

    /// All keys currently visible under `scope` for `table`, ascending.
    /// A row-store collaborator uses this to build its sorted walk order;
    /// the model itself has no notion of page layout.
    pub fn table_keys(&self, table: &str, scope: ReadScope) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        let Some(t) = inner.tables.get(table) else {
            return Vec::new();
        };
        let bound = match scope {
            ReadScope::Latest => None,
            ReadScope::AsOf(ts) => Some(ts),
            ReadScope::InTransaction(me) => inner.active_txns.get(&me).and_then(|t| t.read_ts),
        };
        t.rows
            .iter()
            .filter(|(_, history)| {
                if let ReadScope::InTransaction(me) = scope {
                    if let Some(pending) = &history.pending {
                        if pending.txn_id == me {
                            return pending.value.as_visible().is_some();
                        }
                    }
                }
                // A prepared, not-owned pending update blocks visibility
                // the same way `get` reports a `PrepareConflict` for it —
                // keep the key so a caller iterating via `table_keys` and
                // then reading each key with `get` still observes that
                // conflict, rather than silently skipping the row.
                if let Some(pending) = &history.pending {
                    if pending.state == UpdateState::Prepared {
                        return true;
                    }
                }
                history
                    .committed_as_of(bound)
                    .and_then(|u| u.value.as_visible())
                    .is_some()
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Look up a checkpoint by name; `None` selects the most recent
    /// unnamed checkpoint.
    pub fn checkpoint(&self, name: Option<&str>) -> Result<Arc<Checkpoint>, ModelError> {
        let inner = self.inner.lock().unwrap();
        match name {
            Some(n) => inner
                .named_checkpoints
                .get(n)
                .cloned()
                .ok_or_else(|| ModelError::NoSuchCheckpoint(n.to_string())),
            None => inner
                .unnamed_checkpoint
                .clone()
                .ok_or_else(|| ModelError::NoSuchCheckpoint("<unnamed>".to_string())),
        }
    }
}
