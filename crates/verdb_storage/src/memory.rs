//! In-memory ledger backend for testing.

use crate::backend::{LedgerBackend, RowKey};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// One partition's rows plus their insertion order.
#[derive(Debug, Default)]
struct Partition {
    /// Rows keyed for exact and ranged lookup.
    rows: BTreeMap<RowKey, Vec<u8>>,
    /// Keys in the order they were inserted.
    log: Vec<RowKey>,
}

/// An in-memory ledger backend.
///
/// This backend stores all rows in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads behind an
/// `Arc`. The insert-if-absent check runs under a single write lock, which
/// makes it atomic with respect to concurrent inserters.
///
/// # Example
///
/// ```rust
/// use verdb_storage::{LedgerBackend, MemoryBackend, RowKey};
///
/// let backend = MemoryBackend::new();
/// let key = RowKey::new([7u8; 16], 1);
/// backend.insert("cities", key, b"row".to_vec()).unwrap();
/// assert!(backend.insert("cities", key, b"again".to_vec()).is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    partitions: RwLock<HashMap<String, Partition>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows in a partition.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn row_count(&self, partition: &str) -> usize {
        self.partitions
            .read()
            .get(partition)
            .map_or(0, |p| p.rows.len())
    }

    /// Clears all partitions.
    pub fn clear(&self) {
        self.partitions.write().clear();
    }
}

impl LedgerBackend for MemoryBackend {
    fn insert(&self, partition: &str, key: RowKey, row: Vec<u8>) -> StorageResult<()> {
        let mut partitions = self.partitions.write();
        let part = partitions.entry(partition.to_string()).or_default();

        if part.rows.contains_key(&key) {
            return Err(StorageError::slot_occupied(key.entity, key.version));
        }

        part.rows.insert(key, row);
        part.log.push(key);
        Ok(())
    }

    fn get(&self, partition: &str, key: &RowKey) -> StorageResult<Option<Vec<u8>>> {
        let partitions = self.partitions.read();
        Ok(partitions
            .get(partition)
            .and_then(|p| p.rows.get(key).cloned()))
    }

    fn last_version(&self, partition: &str, entity: &[u8; 16]) -> StorageResult<Option<u64>> {
        let partitions = self.partitions.read();
        let Some(part) = partitions.get(partition) else {
            return Ok(None);
        };
        let range = RowKey::new(*entity, 0)..=RowKey::new(*entity, u64::MAX);
        Ok(part.rows.range(range).next_back().map(|(k, _)| k.version))
    }

    fn scan_entity(
        &self,
        partition: &str,
        entity: &[u8; 16],
    ) -> StorageResult<Vec<(RowKey, Vec<u8>)>> {
        let partitions = self.partitions.read();
        let Some(part) = partitions.get(partition) else {
            return Ok(Vec::new());
        };
        let range = RowKey::new(*entity, 0)..=RowKey::new(*entity, u64::MAX);
        Ok(part
            .rows
            .range(range)
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }

    fn scan_partition(&self, partition: &str) -> StorageResult<Vec<(RowKey, Vec<u8>)>> {
        let partitions = self.partitions.read();
        let Some(part) = partitions.get(partition) else {
            return Ok(Vec::new());
        };
        Ok(part
            .log
            .iter()
            .filter_map(|k| part.rows.get(k).map(|v| (*k, v.clone())))
            .collect())
    }
}
