//! Write orchestration with optimistic concurrency.

use crate::clock::Clock;
use crate::diff::diff;
use crate::entry::EntryId;
use crate::error::{CoreError, CoreResult};
use crate::ledger::Ledger;
use crate::version::{EntryVersion, Operation};
use serde_json::Value;
use std::sync::Arc;

/// Orchestrates add/update/delete against the ledger.
///
/// Every mutation reads the current head, validates the caller's expected
/// version, and appends the next version atomically. When an append loses
/// a race against a concurrent writer, the whole read-compare-append cycle
/// is retried exactly once; a second loss surfaces as `UpdateConflict`.
/// There is no locking - per-entity serialization comes from the ledger's
/// atomic-append contract.
pub struct Controller {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
}

impl Controller {
    /// Creates a controller over a ledger and a timestamp source.
    pub fn new(ledger: Arc<Ledger>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Creates an entry as version 1.
    ///
    /// Mints a fresh identity unless the caller supplies one. A supplied
    /// identity that already has a head fails with `UpdateConflict`
    /// carrying the diff against the existing head.
    ///
    /// # Errors
    ///
    /// Returns `UpdateConflict` if the identity already exists, or any
    /// storage/codec error.
    pub fn add(
        &self,
        partition: &str,
        body: Value,
        editor: impl Into<String>,
        message: impl Into<String>,
        entity_id: Option<EntryId>,
    ) -> CoreResult<EntryVersion> {
        let timestamp = self.clock.now_secs();
        let entity_id =
            entity_id.unwrap_or_else(|| EntryId::from_timestamp_ms((timestamp * 1000.0) as u64));

        if let Some(head) = self.ledger.head(partition, &entity_id)? {
            return Err(CoreError::update_conflict(diff(&head.body, &body)));
        }

        let row = EntryVersion {
            entity_id,
            version: 1,
            timestamp,
            editor: editor.into(),
            message: message.into(),
            body,
            operation: Operation::Added,
        };
        match self.ledger.append(partition, &row) {
            Ok(()) => Ok(row),
            // A pre-minted identity raced with another creator.
            Err(CoreError::VersionConflict { .. }) => {
                let head = self
                    .ledger
                    .head(partition, &entity_id)?
                    .ok_or(CoreError::EntryNotFound { entity_id })?;
                Err(CoreError::update_conflict(diff(&head.body, &row.body)))
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces an entry's body, appending the next version.
    ///
    /// An update whose body is structurally equal to the head's still
    /// produces a new version: an explicit update call always records,
    /// unless the caller's version pointer is stale.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if the entity has no rows.
    /// - `UpdateConflict` if `expected_version` is not the head's version;
    ///   the attached diff is `diff(head.body, body)`.
    pub fn update(
        &self,
        partition: &str,
        entity_id: EntryId,
        expected_version: u64,
        body: Value,
        editor: impl Into<String>,
        message: impl Into<String>,
    ) -> CoreResult<EntryVersion> {
        self.mutate(
            partition,
            entity_id,
            expected_version,
            Some(body),
            editor.into(),
            message.into(),
        )
    }

    /// Logically deletes an entry, appending a `Deleted` row.
    ///
    /// The deleted row carries the prior body forward, so history display
    /// and diff-against-delete can show what was deleted.
    ///
    /// # Errors
    ///
    /// Same as [`Controller::update`]; the conflict diff compares the
    /// head's body against the body at the caller's expected version.
    pub fn delete(
        &self,
        partition: &str,
        entity_id: EntryId,
        expected_version: u64,
        editor: impl Into<String>,
        message: impl Into<String>,
    ) -> CoreResult<EntryVersion> {
        self.mutate(
            partition,
            entity_id,
            expected_version,
            None,
            editor.into(),
            message.into(),
        )
    }

    /// The shared read-compare-append cycle. `body` is `None` for deletes,
    /// which carry the head's body forward.
    fn mutate(
        &self,
        partition: &str,
        entity_id: EntryId,
        expected_version: u64,
        body: Option<Value>,
        editor: String,
        message: String,
    ) -> CoreResult<EntryVersion> {
        // One transparent retry when the append loses a race. The re-read
        // sees the winner's head, so a stale caller falls out through the
        // expected-version check with a fresh diff.
        for attempt in 0..2 {
            let head = self
                .ledger
                .head(partition, &entity_id)?
                .ok_or(CoreError::EntryNotFound { entity_id })?;

            if head.version != expected_version {
                let candidate = match &body {
                    Some(body) => body.clone(),
                    None => self.stale_delete_candidate(partition, &entity_id, expected_version)?,
                };
                return Err(CoreError::update_conflict(diff(&head.body, &candidate)));
            }

            let row = EntryVersion {
                entity_id,
                version: head.version + 1,
                timestamp: self.clock.now_secs(),
                editor: editor.clone(),
                message: message.clone(),
                body: body.clone().unwrap_or_else(|| head.body.clone()),
                operation: if body.is_some() {
                    Operation::Updated
                } else {
                    Operation::Deleted
                },
            };

            match self.ledger.append(partition, &row) {
                Ok(()) => return Ok(row),
                Err(CoreError::VersionConflict { version, .. }) if attempt == 0 => {
                    tracing::warn!(
                        entity_id = %entity_id,
                        version,
                        "append lost a race, retrying once"
                    );
                }
                Err(CoreError::VersionConflict { .. }) => {
                    let head = self
                        .ledger
                        .head(partition, &entity_id)?
                        .ok_or(CoreError::EntryNotFound { entity_id })?;
                    let candidate = match &body {
                        Some(body) => body.clone(),
                        None => {
                            self.stale_delete_candidate(partition, &entity_id, expected_version)?
                        }
                    };
                    return Err(CoreError::update_conflict(diff(&head.body, &candidate)));
                }
                Err(e @ CoreError::SequenceGap { .. }) => {
                    tracing::error!(entity_id = %entity_id, error = %e, "ledger sequence gap");
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("mutate loop always returns within two attempts")
    }

    /// Candidate body for a stale delete's conflict diff: the body the
    /// caller last saw, or the head's body when that version is gone.
    fn stale_delete_candidate(
        &self,
        partition: &str,
        entity_id: &EntryId,
        expected_version: u64,
    ) -> CoreResult<Value> {
        match self
            .ledger
            .at_version(partition, entity_id, expected_version)?
        {
            Some(row) => Ok(row.body),
            None => Ok(Value::Object(serde_json::Map::new())),
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::diff::DiffEntry;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use verdb_storage::{LedgerBackend, MemoryBackend, RowKey, StorageError, StorageResult};

    fn controller() -> Controller {
        let ledger = Arc::new(Ledger::new(Arc::new(MemoryBackend::new())));
        Controller::new(ledger, Arc::new(MonotonicClock::new()))
    }

    fn controller_with_ledger() -> (Controller, Arc<Ledger>) {
        let ledger = Arc::new(Ledger::new(Arc::new(MemoryBackend::new())));
        let controller = Controller::new(Arc::clone(&ledger), Arc::new(MonotonicClock::new()));
        (controller, ledger)
    }

    #[test]
    fn add_mints_identity_and_writes_version_one() {
        let controller = controller();
        let row = controller
            .add("p", json!({"name": "Berlin"}), "alice", "create", None)
            .unwrap();

        assert_eq!(row.version, 1);
        assert_eq!(row.operation, Operation::Added);
        assert_eq!(row.editor, "alice");
    }

    #[test]
    fn add_accepts_pre_minted_identity() {
        let controller = controller();
        let id = EntryId::new();
        let row = controller
            .add("p", json!({}), "alice", "", Some(id))
            .unwrap();
        assert_eq!(row.entity_id, id);
    }

    #[test]
    fn add_existing_identity_conflicts() {
        let controller = controller();
        let id = EntryId::new();
        controller
            .add("p", json!({"a": 1}), "alice", "", Some(id))
            .unwrap();

        let result = controller.add("p", json!({"a": 2}), "bob", "", Some(id));
        assert!(matches!(result, Err(CoreError::UpdateConflict { .. })));
    }

    #[test]
    fn update_advances_version() {
        let controller = controller();
        let row = controller
            .add("p", json!({"population": 4}), "alice", "", None)
            .unwrap();

        let updated = controller
            .update(
                "p",
                row.entity_id,
                1,
                json!({"population": 5}),
                "bob",
                "grew",
            )
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(updated.operation, Operation::Updated);
        assert!(updated.timestamp > row.timestamp);
    }

    #[test]
    fn update_missing_entity_is_not_found() {
        let controller = controller();
        let result = controller.update("p", EntryId::new(), 1, json!({}), "alice", "");
        assert!(matches!(result, Err(CoreError::EntryNotFound { .. })));
    }

    #[test]
    fn stale_update_conflicts_with_diff() {
        let controller = controller();
        let row = controller
            .add("p", json!({"population": 4}), "alice", "", None)
            .unwrap();
        controller
            .update("p", row.entity_id, 1, json!({"population": 5}), "bob", "")
            .unwrap();

        // Still pointing at version 1 while the head is 2.
        let result = controller.update(
            "p",
            row.entity_id,
            1,
            json!({"population": 6}),
            "carol",
            "",
        );
        match result {
            Err(CoreError::UpdateConflict { diff }) => {
                assert_eq!(
                    diff,
                    vec![DiffEntry::Changed {
                        field: "population".to_string(),
                        before: json!(5),
                        after: json!(6),
                    }]
                );
            }
            other => panic!("expected UpdateConflict, got {other:?}"),
        }
    }

    #[test]
    fn equal_body_update_still_records_a_version() {
        let controller = controller();
        let body = json!({"a": 1});
        let row = controller.add("p", body.clone(), "alice", "", None).unwrap();

        let updated = controller
            .update("p", row.entity_id, 1, body, "alice", "touch")
            .unwrap();
        assert_eq!(updated.version, 2);
    }

    #[test]
    fn delete_carries_prior_body_forward() {
        let (controller, ledger) = controller_with_ledger();
        let body = json!({"name": "Berlin"});
        let row = controller.add("p", body.clone(), "alice", "", None).unwrap();

        let deleted = controller
            .delete("p", row.entity_id, 1, "bob", "cleanup")
            .unwrap();
        assert_eq!(deleted.operation, Operation::Deleted);
        assert_eq!(deleted.body, body);

        // Full history remains readable.
        assert_eq!(
            ledger
                .at_version("p", &row.entity_id, 1)
                .unwrap()
                .unwrap()
                .body,
            body
        );
    }

    #[test]
    fn stale_delete_conflicts() {
        let controller = controller();
        let row = controller.add("p", json!({"a": 1}), "alice", "", None).unwrap();
        controller
            .update("p", row.entity_id, 1, json!({"a": 2}), "bob", "")
            .unwrap();

        let result = controller.delete("p", row.entity_id, 1, "carol", "");
        match result {
            Err(CoreError::UpdateConflict { diff }) => {
                // What changed underneath the deleter: a went 2 -> 1.
                assert_eq!(diff.len(), 1);
                assert_eq!(diff[0].field(), "a");
            }
            other => panic!("expected UpdateConflict, got {other:?}"),
        }
    }

    /// Backend that rejects the first version-2 append outright and lands
    /// a rival row just before the second, so both of the deleter's
    /// attempts lose while its re-read between them still sees version 1.
    struct RacedBackend {
        inner: MemoryBackend,
        rival: Vec<u8>,
        version_two_inserts: AtomicUsize,
    }

    impl LedgerBackend for RacedBackend {
        fn insert(&self, partition: &str, key: RowKey, row: Vec<u8>) -> StorageResult<()> {
            if key.version == 2 {
                let n = self.version_two_inserts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    return Err(StorageError::slot_occupied(key.entity, key.version));
                }
                if n == 1 {
                    self.inner.insert(partition, key, self.rival.clone())?;
                }
            }
            self.inner.insert(partition, key, row)
        }

        fn get(&self, partition: &str, key: &RowKey) -> StorageResult<Option<Vec<u8>>> {
            self.inner.get(partition, key)
        }

        fn last_version(&self, partition: &str, entity: &[u8; 16]) -> StorageResult<Option<u64>> {
            self.inner.last_version(partition, entity)
        }

        fn scan_entity(
            &self,
            partition: &str,
            entity: &[u8; 16],
        ) -> StorageResult<Vec<(RowKey, Vec<u8>)>> {
            self.inner.scan_entity(partition, entity)
        }

        fn scan_partition(&self, partition: &str) -> StorageResult<Vec<(RowKey, Vec<u8>)>> {
            self.inner.scan_partition(partition)
        }
    }

    #[test]
    fn twice_raced_delete_diffs_against_expected_version_body() {
        let entity_id = EntryId::new();
        let rival = EntryVersion {
            entity_id,
            version: 2,
            timestamp: 2.0,
            editor: "bob".to_string(),
            body: json!({"a": 9}),
            message: String::new(),
            operation: Operation::Updated,
        };
        let backend = RacedBackend {
            inner: MemoryBackend::new(),
            rival: rival.to_row_bytes().unwrap(),
            version_two_inserts: AtomicUsize::new(0),
        };
        let ledger = Arc::new(Ledger::new(Arc::new(backend)));
        let controller = Controller::new(Arc::clone(&ledger), Arc::new(MonotonicClock::new()));

        controller
            .add("p", json!({"a": 1}), "alice", "", Some(entity_id))
            .unwrap();

        let result = controller.delete("p", entity_id, 1, "carol", "");
        match result {
            Err(CoreError::UpdateConflict { diff }) => {
                // The rival's body against the body the deleter last saw.
                assert_eq!(
                    diff,
                    vec![DiffEntry::Changed {
                        field: "a".to_string(),
                        before: json!(9),
                        after: json!(1),
                    }]
                );
            }
            other => panic!("expected UpdateConflict, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_updates_exactly_one_winner() {
        let (controller, ledger) = controller_with_ledger();
        let controller = Arc::new(controller);
        let row = controller.add("p", json!({"n": 0}), "alice", "", None).unwrap();
        let id = row.entity_id;

        let mut handles = Vec::new();
        for i in 0..8 {
            let controller = Arc::clone(&controller);
            handles.push(std::thread::spawn(move || {
                controller
                    .update("p", id, 1, json!({ "n": i }), format!("user{i}"), "")
                    .is_ok()
            }));
        }

        let wins: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(wins, 1);

        // No gap: the head is exactly version 2.
        let head = ledger.head("p", &id).unwrap().unwrap();
        assert_eq!(head.version, 2);
        assert!(ledger.at_version("p", &id, 3).unwrap().is_none());
    }

    #[test]
    fn sequential_versions_are_gapless_under_contention() {
        let (controller, ledger) = controller_with_ledger();
        let controller = Arc::new(controller);
        let row = controller.add("p", json!({"n": 0}), "alice", "", None).unwrap();
        let id = row.entity_id;

        // Writers that re-read the head before each attempt; every accepted
        // write lands on a distinct consecutive version.
        let mut handles = Vec::new();
        for t in 0..4 {
            let controller = Arc::clone(&controller);
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                let mut accepted: u64 = 0;
                for i in 0..10 {
                    let head = ledger.head("p", &id).unwrap().unwrap();
                    if controller
                        .update("p", id, head.version, json!({"n": i}), format!("t{t}"), "")
                        .is_ok()
                    {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }
        let accepted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        let head = ledger.head("p", &id).unwrap().unwrap();
        assert_eq!(head.version, accepted + 1);
        for v in 1..=head.version {
            assert!(ledger.at_version("p", &id, v).unwrap().is_some());
        }
    }
}
