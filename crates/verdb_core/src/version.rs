//! Entry version rows.

use crate::entry::EntryId;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of write that produced a version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// The entry was created.
    Added,
    /// The entry's body was replaced.
    Updated,
    /// The entry was logically deleted.
    Deleted,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Updated => write!(f, "UPDATED"),
            Self::Deleted => write!(f, "DELETED"),
        }
    }
}

/// One immutable snapshot in an entry's history.
///
/// For a fixed entity, versions are exactly `1..N` with no gaps, and rows
/// are never modified once written. The highest-version row is the entity's
/// head; a head with `operation == Deleted` means the entity is logically
/// absent from current views while its history stays readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryVersion {
    /// The entity this row belongs to.
    pub entity_id: EntryId,
    /// Version number, starting at 1.
    pub version: u64,
    /// UTC seconds since epoch, strictly increasing across all rows
    /// written by one process.
    pub timestamp: f64,
    /// The acting user.
    pub editor: String,
    /// Free-text edit comment, may be empty.
    pub message: String,
    /// The entry body: an arbitrary tree of maps, lists, and scalars.
    pub body: Value,
    /// The kind of write that produced this row.
    pub operation: Operation,
}

impl EntryVersion {
    /// Returns true if this row records a deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.operation == Operation::Deleted
    }

    /// Encodes this row to CBOR bytes for the ledger backend.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Codec` if serialization fails.
    pub fn to_row_bytes(&self) -> CoreResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes).map_err(|e| CoreError::codec(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes a row from CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Codec` if the bytes are not a valid row.
    pub fn from_row_bytes(bytes: &[u8]) -> CoreResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
    }
}
