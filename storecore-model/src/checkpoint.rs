use std::collections::BTreeMap;

use crate::update::Update;
use crate::value::UpdateValue;
use crate::Timestamp;

/// An immutable logical snapshot. Built once at creation time by
/// copying out each table's committed history up to `stable_ts_at_creation`
/// — `None` if `stable_ts` had never been set — so later writes to the
/// live database can never be observed through it.
#[derive(Debug)]
pub struct Checkpoint {
    name: Option<String>,
    stable_ts_at_creation: Option<Timestamp>,
    tables: BTreeMap<String, BTreeMap<Vec<u8>, Vec<Update>>>,
}

impl Checkpoint {
    pub(crate) fn new(
        name: Option<String>,
        stable_ts_at_creation: Option<Timestamp>,
        tables: BTreeMap<String, BTreeMap<Vec<u8>, Vec<Update>>>,
    ) -> Self {
        Self {
            name,
            stable_ts_at_creation,
            tables,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn stable_ts_at_creation(&self) -> Option<Timestamp> {
        self.stable_ts_at_creation
    }

    /// Read `table[key]` as this checkpoint sees it.
    pub fn get(&self, table: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.get_with_debug_ts(table, key, None)
    }

    /// All keys with a version recorded for `table` at checkpoint
    /// creation, ascending. A row-store collaborator opening a cursor
    /// against this checkpoint uses this to build its walk order; keys
    /// whose only visible version (per [`Checkpoint::get`]) is a
    /// tombstone are still listed here and filtered out by the caller.
    pub fn table_keys(&self, table: &str) -> Vec<Vec<u8>> {
        self.tables
            .get(table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Read with an optional debug read-timestamp overlaid on the
    /// checkpoint's own bound — the tighter of the two wins.
    ///
    /// The bound is checked against each update's `durable_ts`, not its
    /// `commit_ts`: a checkpoint is itself a durability point, and a
    /// transaction that committed with `commit_ts <= S` but whose
    /// `durable_ts` lands after `S` (as a prepared transaction's commit
    /// can) is not yet stable enough to appear in it — the checkpoint
    /// falls through to the previous version instead. `durable_ts` is
    /// always `>= commit_ts`, so this bound is never looser than a plain
    /// `commit_ts` check and is a no-op whenever the two coincide, which
    /// is the case for every non-prepared commit.
    pub fn get_with_debug_ts(
        &self,
        table: &str,
        key: &[u8],
        debug_read_ts: Option<Timestamp>,
    ) -> Option<Vec<u8>> {
        let bound = match (self.stable_ts_at_creation, debug_read_ts) {
            (Some(s), Some(d)) => Some(s.min(d)),
            (Some(s), None) => Some(s),
            (None, Some(d)) => Some(d),
            (None, None) => None,
        };
        let history = self.tables.get(table)?.get(key)?;
        let update = history
            .iter()
            .rev()
            .find(|u| bound.map_or(true, |b| u.durable_ts.unwrap_or(0) <= b))?;
        match &update.value {
            UpdateValue::Data(bytes) => Some(bytes.clone()),
            UpdateValue::Tombstone => None,
        }
    }
}
