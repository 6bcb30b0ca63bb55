//! # VerDB Core
//!
//! Versioned entry store engine for VerDB.
//!
//! This crate provides:
//! - Time-sortable entry identities
//! - An append-only per-resource version ledger
//! - Optimistic concurrency control for add/update/delete
//! - Structural diffs between entry bodies
//! - Filtered, paginated history queries with per-row diffs
//!
//! Mutations never touch a row in place: every accepted write appends the
//! next immutable version of its entity, and the atomic append is the
//! commit point. See [`VersionStore`] for the main entry point.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod controller;
mod diff;
mod entry;
mod error;
mod history;
mod ledger;
mod store;
mod version;

pub use clock::{Clock, MonotonicClock, StepClock};
pub use controller::Controller;
pub use diff::{diff, DiffEntry};
pub use entry::EntryId;
pub use error::{CoreError, CoreResult};
pub use history::{DiffRequest, DiffResult, HistoryEngine, HistoryEntry, HistoryFilter, HistoryPage};
pub use ledger::{Ledger, ScanFilter};
pub use store::VersionStore;
pub use version::{EntryVersion, Operation};
