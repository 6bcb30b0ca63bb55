//! Ledger backend trait definition.

use crate::error::StorageResult;
use std::fmt;

/// Key of a single ledger row: an entity identity plus a version number.
///
/// Keys order first by entity bytes, then by version, so a range scan over
/// one entity's keys yields its rows in version order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    /// The entity identity bytes.
    pub entity: [u8; 16],
    /// The version number (1-based).
    pub version: u64,
}

impl RowKey {
    /// Creates a row key.
    #[inline]
    #[must_use]
    pub const fn new(entity: [u8; 16], version: u64) -> Self {
        Self { entity, version }
    }
}

impl fmt::Debug for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowKey({:02x?}@v{})", &self.entity[..4], self.version)
    }
}

/// A keyed append-only storage backend for VerDB.
///
/// Ledger backends are **opaque row stores**. Each row is a byte payload
/// keyed by [`RowKey`] inside a named partition (one partition per
/// resource). VerDB owns all row format interpretation - backends do not
/// understand versions, diffs, or entry semantics.
///
/// # Invariants
///
/// - `insert` is atomic insert-if-absent: it either stores the row and
///   returns `Ok`, or fails with `SlotOccupied` without modifying anything.
///   Two concurrent inserts of the same key must never both succeed.
/// - Rows are immutable once inserted; there is no update or delete.
/// - `scan_partition` returns rows in insertion order, which for VerDB's
///   write path is also timestamp order.
/// - Backends must be `Send + Sync` for concurrent access.
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing and ephemeral stores. A
///   relational table with a primary key on `(entity, version)` satisfies
///   the same contract.
pub trait LedgerBackend: Send + Sync {
    /// Inserts a row at `key`, failing if the slot is already occupied.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::SlotOccupied` if a row already exists at
    /// `key` in this partition, or an I/O error from the backing store.
    fn insert(&self, partition: &str, key: RowKey, row: Vec<u8>) -> StorageResult<()>;

    /// Returns the row at `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn get(&self, partition: &str, key: &RowKey) -> StorageResult<Option<Vec<u8>>>;

    /// Returns the highest version present for an entity, or `None` if the
    /// entity has no rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn last_version(&self, partition: &str, entity: &[u8; 16]) -> StorageResult<Option<u64>>;

    /// Returns all rows for one entity, in version order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn scan_entity(
        &self,
        partition: &str,
        entity: &[u8; 16],
    ) -> StorageResult<Vec<(RowKey, Vec<u8>)>>;

    /// Returns all rows in a partition, in insertion order.
    ///
    /// Insertion order is timestamp order for rows written through the
    /// VerDB controller, since its timestamps are strictly increasing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn scan_partition(&self, partition: &str) -> StorageResult<Vec<(RowKey, Vec<u8>)>>;
}
