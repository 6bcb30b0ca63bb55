//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The target row slot is already occupied.
    ///
    /// Raised by [`crate::LedgerBackend::insert`] when a row already exists
    /// at the given `(entity, version)` key. This is the signal that two
    /// writers raced for the same next version.
    #[error("slot occupied: entity {entity:?} version {version}")]
    SlotOccupied {
        /// The entity whose slot was contested.
        entity: [u8; 16],
        /// The version that was already present.
        version: u64,
    },

    /// The backend is corrupted or in an invalid state.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The backend is closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Creates a slot-occupied error.
    #[must_use]
    pub fn slot_occupied(entity: [u8; 16], version: u64) -> Self {
        Self::SlotOccupied { entity, version }
    }

    /// Returns true if this error is a slot-occupied conflict.
    #[must_use]
    pub fn is_slot_occupied(&self) -> bool {
        matches!(self, Self::SlotOccupied { .. })
    }
}
