//! Version store facade.

use crate::clock::{Clock, MonotonicClock};
use crate::controller::Controller;
use crate::entry::EntryId;
use crate::error::{CoreError, CoreResult};
use crate::history::{DiffRequest, DiffResult, HistoryEngine, HistoryFilter, HistoryPage};
use crate::ledger::Ledger;
use crate::version::EntryVersion;
use serde_json::Value;
use std::sync::Arc;
use verdb_storage::{LedgerBackend, MemoryBackend};

/// The main store handle.
///
/// `VersionStore` is the primary entry point for working with versioned
/// entries. Each resource (named collection) maps to one append-only
/// partition in the backend; entries within it are identified by
/// [`EntryId`] and carry an immutable version history.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use verdb_core::VersionStore;
///
/// let store = VersionStore::open_in_memory();
///
/// let created = store
///     .add("cities", json!({"name": "Berlin"}), "alice", "import", None)
///     .unwrap();
/// let updated = store
///     .update(
///         "cities",
///         created.entity_id,
///         created.version,
///         json!({"name": "Berlin", "population": 3_700_000}),
///         "bob",
///         "add population",
///     )
///     .unwrap();
/// assert_eq!(updated.version, 2);
/// ```
pub struct VersionStore {
    ledger: Arc<Ledger>,
    controller: Controller,
    history: HistoryEngine,
}

impl VersionStore {
    /// Opens a store over a ledger backend, with a wall-clock-backed
    /// monotonic clock.
    pub fn open(backend: Arc<dyn LedgerBackend>) -> Self {
        Self::open_with_clock(backend, Arc::new(MonotonicClock::new()))
    }

    /// Opens a store with an explicit clock, for deterministic tests.
    pub fn open_with_clock(backend: Arc<dyn LedgerBackend>, clock: Arc<dyn Clock>) -> Self {
        let ledger = Arc::new(Ledger::new(backend));
        let controller = Controller::new(Arc::clone(&ledger), clock);
        let history = HistoryEngine::new(Arc::clone(&ledger));
        Self {
            ledger,
            controller,
            history,
        }
    }

    /// Opens an ephemeral in-memory store.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::open(Arc::new(MemoryBackend::new()))
    }

    /// Creates an entry in a resource, minting an identity unless one is
    /// supplied. Returns the stored version-1 row.
    ///
    /// # Errors
    ///
    /// Returns `UpdateConflict` if a supplied identity already exists.
    pub fn add(
        &self,
        resource: &str,
        body: Value,
        editor: impl Into<String>,
        message: impl Into<String>,
        entity_id: Option<EntryId>,
    ) -> CoreResult<EntryVersion> {
        self.controller.add(resource, body, editor, message, entity_id)
    }

    /// Replaces an entry's body if `expected_version` is still the head.
    /// Returns the stored row.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if the entity has no rows.
    /// - `UpdateConflict` with the diff against the true head if the
    ///   caller's version is stale.
    pub fn update(
        &self,
        resource: &str,
        entity_id: EntryId,
        expected_version: u64,
        body: Value,
        editor: impl Into<String>,
        message: impl Into<String>,
    ) -> CoreResult<EntryVersion> {
        self.controller
            .update(resource, entity_id, expected_version, body, editor, message)
    }

    /// Logically deletes an entry if `expected_version` is still the head.
    /// The recorded row carries the prior body forward.
    ///
    /// # Errors
    ///
    /// Same as [`VersionStore::update`].
    pub fn delete(
        &self,
        resource: &str,
        entity_id: EntryId,
        expected_version: u64,
        editor: impl Into<String>,
    ) -> CoreResult<EntryVersion> {
        self.controller
            .delete(resource, entity_id, expected_version, editor, String::new())
    }

    /// Returns an entry's snapshot.
    ///
    /// With a version, this is an exact historical lookup and returns the
    /// row even if it (or the head) records a deletion. Without one, it
    /// returns the head of the current view.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the row is absent, or - for the
    /// current view - if the head records a deletion.
    pub fn get(
        &self,
        resource: &str,
        entity_id: EntryId,
        version: Option<u64>,
    ) -> CoreResult<EntryVersion> {
        match version {
            Some(version) => self
                .ledger
                .at_version(resource, &entity_id, version)?
                .ok_or(CoreError::EntryNotFound { entity_id }),
            None => {
                let head = self
                    .ledger
                    .head(resource, &entity_id)?
                    .ok_or(CoreError::EntryNotFound { entity_id })?;
                if head.is_deleted() {
                    return Err(CoreError::EntryNotFound { entity_id });
                }
                Ok(head)
            }
        }
    }

    /// Answers a filtered, paginated history request over a resource.
    pub fn get_history(
        &self,
        resource: &str,
        filter: &HistoryFilter,
        page: usize,
        page_size: usize,
    ) -> CoreResult<HistoryPage> {
        self.history.get_history(resource, filter, page, page_size)
    }

    /// Computes a diff between two points of one entry's history.
    ///
    /// # Errors
    ///
    /// Returns `DiffImpossible` if either side of the range resolves to
    /// no snapshot.
    pub fn get_diff(
        &self,
        resource: &str,
        entity_id: EntryId,
        request: &DiffRequest,
    ) -> CoreResult<DiffResult> {
        self.history.get_entry_diff(resource, entity_id, request)
    }
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore").finish_non_exhaustive()
    }
}
