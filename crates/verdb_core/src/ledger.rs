//! Append-only entry version ledger.

use crate::entry::EntryId;
use crate::error::{CoreError, CoreResult};
use crate::version::EntryVersion;
use std::sync::Arc;
use verdb_storage::{LedgerBackend, RowKey, StorageError};

/// Filter for ledger scans.
///
/// All fields combine with AND. Matching rows come back in timestamp
/// order, ascending, with `offset`/`limit` applied after filtering.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    /// Restrict to one entity.
    pub entity_id: Option<EntryId>,
    /// Restrict to rows written by this editor.
    pub editor: Option<String>,
    /// Inclusive lower timestamp bound.
    pub from_timestamp: Option<f64>,
    /// Inclusive upper timestamp bound.
    pub to_timestamp: Option<f64>,
    /// Inclusive lower version bound.
    pub from_version: Option<u64>,
    /// Inclusive upper version bound.
    pub to_version: Option<u64>,
    /// Rows to skip after filtering.
    pub offset: usize,
    /// Maximum rows to yield, `None` for all.
    pub limit: Option<usize>,
}

impl ScanFilter {
    /// Creates an empty filter matching every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the scan to one entity.
    #[must_use]
    pub fn entity(mut self, entity_id: EntryId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    /// Restricts the scan to one editor.
    #[must_use]
    pub fn editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    /// Bounds the timestamp range (inclusive on both ends).
    #[must_use]
    pub fn timestamps(mut self, from: Option<f64>, to: Option<f64>) -> Self {
        self.from_timestamp = from;
        self.to_timestamp = to;
        self
    }

    /// Bounds the version range (inclusive on both ends).
    #[must_use]
    pub fn versions(mut self, from: Option<u64>, to: Option<u64>) -> Self {
        self.from_version = from;
        self.to_version = to;
        self
    }

    /// Applies offset/limit pagination.
    #[must_use]
    pub fn paginate(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    fn matches(&self, row: &EntryVersion) -> bool {
        if let Some(entity_id) = self.entity_id {
            if row.entity_id != entity_id {
                return false;
            }
        }
        if let Some(editor) = &self.editor {
            if &row.editor != editor {
                return false;
            }
        }
        if let Some(from) = self.from_timestamp {
            if row.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to_timestamp {
            if row.timestamp > to {
                return false;
            }
        }
        if let Some(from) = self.from_version {
            if row.version < from {
                return false;
            }
        }
        if let Some(to) = self.to_version {
            if row.version > to {
                return false;
            }
        }
        true
    }
}

/// The append-only ledger of entry versions.
///
/// One immutable row per `(entity, version)`, stored in one partition per
/// resource. Appends either claim the next version slot atomically or
/// fail; nothing is ever updated in place. Per-entity serialization comes
/// entirely from this atomic-append contract - different entities never
/// block each other.
pub struct Ledger {
    backend: Arc<dyn LedgerBackend>,
}

impl Ledger {
    /// Creates a ledger over a backend.
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self { backend }
    }

    /// Appends a row, enforcing the gapless-version invariant.
    ///
    /// The append is the commit point: once this returns `Ok`, the row is
    /// durable and will never be rolled back.
    ///
    /// # Errors
    ///
    /// - `CoreError::SequenceGap` if `row.version` is beyond the current
    ///   head's version plus one, or zero. This is a programming invariant
    ///   violation, never expected in correct operation.
    /// - `CoreError::VersionConflict` if the slot is already occupied: two
    ///   writers raced for the same next version and this one lost.
    pub fn append(&self, partition: &str, row: &EntryVersion) -> CoreResult<()> {
        let head = self
            .backend
            .last_version(partition, row.entity_id.as_bytes())?;
        let expected = head.map_or(1, |v| v + 1);
        if row.version > expected || row.version == 0 {
            return Err(CoreError::SequenceGap {
                entity_id: row.entity_id,
                expected,
                actual: row.version,
            });
        }

        let bytes = row.to_row_bytes()?;
        let key = RowKey::new(*row.entity_id.as_bytes(), row.version);
        match self.backend.insert(partition, key, bytes) {
            Ok(()) => Ok(()),
            Err(StorageError::SlotOccupied { .. }) => Err(CoreError::VersionConflict {
                entity_id: row.entity_id,
                version: row.version,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the latest row for an entity, or `None` if it has no rows.
    pub fn head(&self, partition: &str, entity_id: &EntryId) -> CoreResult<Option<EntryVersion>> {
        match self.backend.last_version(partition, entity_id.as_bytes())? {
            Some(version) => self.at_version(partition, entity_id, version),
            None => Ok(None),
        }
    }

    /// Returns the row at an exact version, or `None` if absent.
    pub fn at_version(
        &self,
        partition: &str,
        entity_id: &EntryId,
        version: u64,
    ) -> CoreResult<Option<EntryVersion>> {
        let key = RowKey::new(*entity_id.as_bytes(), version);
        match self.backend.get(partition, &key)? {
            Some(bytes) => Ok(Some(EntryVersion::from_row_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns the latest row with `timestamp <= at`, or `None`.
    pub fn at_or_before(
        &self,
        partition: &str,
        entity_id: &EntryId,
        at: f64,
    ) -> CoreResult<Option<EntryVersion>> {
        let rows = self.entity_rows(partition, entity_id)?;
        Ok(rows.into_iter().rev().find(|row| row.timestamp <= at))
    }

    /// Returns the earliest row with `timestamp >= at`, or `None`.
    pub fn at_or_after(
        &self,
        partition: &str,
        entity_id: &EntryId,
        at: f64,
    ) -> CoreResult<Option<EntryVersion>> {
        let rows = self.entity_rows(partition, entity_id)?;
        Ok(rows.into_iter().find(|row| row.timestamp >= at))
    }

    /// Scans a partition with a filter, in ascending timestamp order.
    ///
    /// The returned iterator is lazy, finite, and restartable: re-issuing
    /// the same filter re-scans from the start, there is no cursor state.
    /// Each item is a decoded row or a codec error for a corrupt row.
    pub fn scan<'a>(
        &self,
        partition: &str,
        filter: &'a ScanFilter,
    ) -> CoreResult<impl Iterator<Item = CoreResult<EntryVersion>> + 'a> {
        // Partition insertion order is timestamp order, since appended
        // timestamps strictly increase.
        let raw = if let Some(entity_id) = filter.entity_id {
            self.backend.scan_entity(partition, entity_id.as_bytes())?
        } else {
            self.backend.scan_partition(partition)?
        };

        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(raw
            .into_iter()
            .map(|(_, bytes)| EntryVersion::from_row_bytes(&bytes))
            .filter(move |row| row.as_ref().map_or(true, |r| filter.matches(r)))
            .skip(filter.offset)
            .take(limit))
    }

    /// Counts rows matching a filter, ignoring its pagination.
    pub fn count(&self, partition: &str, filter: &ScanFilter) -> CoreResult<usize> {
        let unpaged = filter.clone().paginate(0, None);
        let mut total = 0;
        for row in self.scan(partition, &unpaged)? {
            row?;
            total += 1;
        }
        Ok(total)
    }

    fn entity_rows(&self, partition: &str, entity_id: &EntryId) -> CoreResult<Vec<EntryVersion>> {
        self.backend
            .scan_entity(partition, entity_id.as_bytes())?
            .into_iter()
            .map(|(_, bytes)| EntryVersion::from_row_bytes(&bytes))
            .collect()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Operation;
    use serde_json::json;
    use verdb_storage::MemoryBackend;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryBackend::new()))
    }

    fn row(entity_id: EntryId, version: u64, timestamp: f64) -> EntryVersion {
        EntryVersion {
            entity_id,
            version,
            timestamp,
            editor: "alice".to_string(),
            message: String::new(),
            body: json!({"v": version}),
            operation: if version == 1 {
                Operation::Added
            } else {
                Operation::Updated
            },
        }
    }

    #[test]
    fn append_and_head() {
        let ledger = ledger();
        let id = EntryId::new();

        ledger.append("p", &row(id, 1, 10.0)).unwrap();
        ledger.append("p", &row(id, 2, 11.0)).unwrap();

        let head = ledger.head("p", &id).unwrap().unwrap();
        assert_eq!(head.version, 2);
    }

    #[test]
    fn head_of_unknown_entity_is_none() {
        let ledger = ledger();
        assert!(ledger.head("p", &EntryId::new()).unwrap().is_none());
    }

    #[test]
    fn append_occupied_slot_is_version_conflict() {
        let ledger = ledger();
        let id = EntryId::new();
        ledger.append("p", &row(id, 1, 10.0)).unwrap();

        let result = ledger.append("p", &row(id, 1, 11.0));
        assert!(matches!(result, Err(CoreError::VersionConflict { .. })));
    }

    #[test]
    fn append_beyond_next_is_sequence_gap() {
        let ledger = ledger();
        let id = EntryId::new();
        ledger.append("p", &row(id, 1, 10.0)).unwrap();

        let result = ledger.append("p", &row(id, 3, 11.0));
        assert!(matches!(
            result,
            Err(CoreError::SequenceGap {
                expected: 2,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn append_version_zero_is_sequence_gap() {
        let ledger = ledger();
        let result = ledger.append("p", &row(EntryId::new(), 0, 10.0));
        assert!(matches!(result, Err(CoreError::SequenceGap { .. })));
    }

    #[test]
    fn at_version_exact_lookup() {
        let ledger = ledger();
        let id = EntryId::new();
        ledger.append("p", &row(id, 1, 10.0)).unwrap();
        ledger.append("p", &row(id, 2, 11.0)).unwrap();

        assert_eq!(ledger.at_version("p", &id, 1).unwrap().unwrap().version, 1);
        assert!(ledger.at_version("p", &id, 3).unwrap().is_none());
    }

    #[test]
    fn at_or_before_picks_nearest_earlier_row() {
        let ledger = ledger();
        let id = EntryId::new();
        for v in 1..=5u64 {
            ledger.append("p", &row(id, v, v as f64)).unwrap();
        }

        let found = ledger.at_or_before("p", &id, 3.5).unwrap().unwrap();
        assert_eq!(found.version, 3);

        // Exact timestamp hit is inclusive.
        let exact = ledger.at_or_before("p", &id, 4.0).unwrap().unwrap();
        assert_eq!(exact.version, 4);

        assert!(ledger.at_or_before("p", &id, 0.5).unwrap().is_none());
    }

    #[test]
    fn at_or_after_picks_nearest_later_row() {
        let ledger = ledger();
        let id = EntryId::new();
        for v in 1..=5u64 {
            ledger.append("p", &row(id, v, v as f64)).unwrap();
        }

        let found = ledger.at_or_after("p", &id, 2.5).unwrap().unwrap();
        assert_eq!(found.version, 3);

        assert!(ledger.at_or_after("p", &id, 5.5).unwrap().is_none());
    }

    #[test]
    fn scan_filters_by_editor() {
        let ledger = ledger();
        let id = EntryId::new();
        let mut r1 = row(id, 1, 1.0);
        r1.editor = "alice".to_string();
        let mut r2 = row(id, 2, 2.0);
        r2.editor = "bob".to_string();
        ledger.append("p", &r1).unwrap();
        ledger.append("p", &r2).unwrap();

        let filter = ScanFilter::new().editor("bob");
        let rows: Vec<EntryVersion> = ledger
            .scan("p", &filter)
            .unwrap()
            .collect::<CoreResult<_>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].editor, "bob");
    }

    #[test]
    fn scan_orders_by_timestamp_across_entities() {
        let ledger = ledger();
        let a = EntryId::new();
        let b = EntryId::new();
        ledger.append("p", &row(a, 1, 1.0)).unwrap();
        ledger.append("p", &row(b, 1, 2.0)).unwrap();
        ledger.append("p", &row(a, 2, 3.0)).unwrap();

        let filter = ScanFilter::new();
        let stamps: Vec<f64> = ledger
            .scan("p", &filter)
            .unwrap()
            .map(|r| r.unwrap().timestamp)
            .collect();
        assert_eq!(stamps, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn scan_pagination() {
        let ledger = ledger();
        let id = EntryId::new();
        for v in 1..=5u64 {
            ledger.append("p", &row(id, v, v as f64)).unwrap();
        }

        let filter = ScanFilter::new().paginate(1, Some(2));
        let versions: Vec<u64> = ledger
            .scan("p", &filter)
            .unwrap()
            .map(|r| r.unwrap().version)
            .collect();
        assert_eq!(versions, vec![2, 3]);
    }

    #[test]
    fn scan_is_restartable() {
        let ledger = ledger();
        let id = EntryId::new();
        for v in 1..=3u64 {
            ledger.append("p", &row(id, v, v as f64)).unwrap();
        }

        let filter = ScanFilter::new().entity(id);
        let first: Vec<u64> = ledger
            .scan("p", &filter)
            .unwrap()
            .map(|r| r.unwrap().version)
            .collect();
        let second: Vec<u64> = ledger
            .scan("p", &filter)
            .unwrap()
            .map(|r| r.unwrap().version)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn count_ignores_pagination() {
        let ledger = ledger();
        let id = EntryId::new();
        for v in 1..=5u64 {
            ledger.append("p", &row(id, v, v as f64)).unwrap();
        }

        let filter = ScanFilter::new().paginate(0, Some(2));
        assert_eq!(ledger.count("p", &filter).unwrap(), 5);
    }

    #[test]
    fn partitions_do_not_leak_into_each_other() {
        let ledger = ledger();
        let id = EntryId::new();
        ledger.append("cities", &row(id, 1, 1.0)).unwrap();

        assert!(ledger.head("people", &id).unwrap().is_none());
        assert_eq!(ledger.count("people", &ScanFilter::new()).unwrap(), 0);
    }
}
