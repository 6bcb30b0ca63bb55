//! Error types for VerDB core.

use crate::diff::DiffEntry;
use crate::entry::EntryId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in VerDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Ledger backend error.
    #[error("storage error: {0}")]
    Storage(#[from] verdb_storage::StorageError),

    /// Row encoding or decoding failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// Referenced entity has no rows, or its head is deleted when a
    /// current view was requested.
    #[error("entry not found: {entity_id}")]
    EntryNotFound {
        /// The entity that was not found.
        entity_id: EntryId,
    },

    /// The caller's expected version is stale.
    ///
    /// Carries the diff between the true head and the caller's candidate
    /// body, so the caller can re-render and retry manually.
    #[error("update conflict: {} field(s) changed underneath the caller", diff.len())]
    UpdateConflict {
        /// Diff between the current head body and the candidate body.
        diff: Vec<DiffEntry>,
    },

    /// Two concurrent writers raced for the same next version and this
    /// one lost.
    ///
    /// Internal signal from the ledger's atomic append; the controller
    /// retries once transparently before reporting `UpdateConflict`.
    #[error("version conflict: entity {entity_id} already has version {version}")]
    VersionConflict {
        /// The contested entity.
        entity_id: EntryId,
        /// The version slot that was already occupied.
        version: u64,
    },

    /// A row was appended out of sequence.
    ///
    /// Internal invariant violation, never expected in correct operation.
    /// Logged and propagated, never downgraded to a user-facing error.
    #[error("sequence gap: entity {entity_id} expected version {expected}, got {actual}")]
    SequenceGap {
        /// The affected entity.
        entity_id: EntryId,
        /// The only version the ledger would accept next.
        expected: u64,
        /// The version the caller tried to append.
        actual: u64,
    },

    /// An identity string does not have the expected length or alphabet.
    #[error("malformed identity: {input:?}")]
    MalformedIdentity {
        /// The rejected input.
        input: String,
    },

    /// A requested diff range resolved to a missing snapshot.
    #[error("diff impossible: {message}")]
    DiffImpossible {
        /// Which side failed to resolve, and why.
        message: String,
    },
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an entry-not-found error.
    #[must_use]
    pub fn entry_not_found(entity_id: EntryId) -> Self {
        Self::EntryNotFound { entity_id }
    }

    /// Creates an update-conflict error carrying the diff against the head.
    #[must_use]
    pub fn update_conflict(diff: Vec<DiffEntry>) -> Self {
        Self::UpdateConflict { diff }
    }

    /// Creates a malformed-identity error.
    pub fn malformed_identity(input: impl Into<String>) -> Self {
        Self::MalformedIdentity {
            input: input.into(),
        }
    }

    /// Creates a diff-impossible error.
    pub fn diff_impossible(message: impl Into<String>) -> Self {
        Self::DiffImpossible {
            message: message.into(),
        }
    }

    /// Returns true if this error is an update conflict.
    #[must_use]
    pub fn is_update_conflict(&self) -> bool {
        matches!(self, Self::UpdateConflict { .. })
    }
}
