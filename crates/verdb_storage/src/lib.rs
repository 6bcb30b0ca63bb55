//! # VerDB Storage
//!
//! Ledger backend trait and implementations for VerDB.
//!
//! This crate provides the lowest-level storage abstraction for VerDB.
//! Ledger backends are **opaque keyed row stores** - they do not interpret
//! the rows they store.
//!
//! ## Design Principles
//!
//! - Backends store opaque byte rows keyed by `(entity, version)` inside
//!   named partitions (one partition per resource)
//! - `insert` is an atomic insert-if-absent: it is the uniqueness constraint
//!   that optimistic concurrency builds on
//! - No knowledge of VerDB row formats, diffs, or version semantics
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - For testing and ephemeral stores
//!
//! ## Example
//!
//! ```rust
//! use verdb_storage::{LedgerBackend, MemoryBackend, RowKey};
//!
//! let backend = MemoryBackend::new();
//! let key = RowKey::new([1u8; 16], 1);
//! backend.insert("cities", key, vec![1, 2, 3]).unwrap();
//! assert_eq!(backend.get("cities", &key).unwrap(), Some(vec![1, 2, 3]));
//! ```

mod backend;
mod error;
mod memory;

pub use backend::{LedgerBackend, RowKey};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
