//! History queries and entry diffs.

use crate::diff::{diff, DiffEntry};
use crate::entry::EntryId;
use crate::error::{CoreError, CoreResult};
use crate::ledger::{Ledger, ScanFilter};
use crate::version::{EntryVersion, Operation};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Filters for a history query. All fields combine with AND; an empty
/// filter matches a resource's entire combined history.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Restrict to rows written by this editor.
    pub editor: Option<String>,
    /// Restrict to one entity.
    pub entity_id: Option<EntryId>,
    /// Inclusive lower timestamp bound.
    pub from_date: Option<f64>,
    /// Inclusive upper timestamp bound.
    pub to_date: Option<f64>,
    /// Inclusive lower version bound.
    pub from_version: Option<u64>,
    /// Inclusive upper version bound.
    pub to_version: Option<u64>,
}

impl HistoryFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one entity.
    #[must_use]
    pub fn entity(mut self, entity_id: EntryId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    /// Restricts to one editor.
    #[must_use]
    pub fn editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    /// Bounds the date range (inclusive).
    #[must_use]
    pub fn dates(mut self, from: Option<f64>, to: Option<f64>) -> Self {
        self.from_date = from;
        self.to_date = to;
        self
    }

    /// Bounds the version range (inclusive).
    #[must_use]
    pub fn versions(mut self, from: Option<u64>, to: Option<u64>) -> Self {
        self.from_version = from;
        self.to_version = to;
        self
    }

    fn to_scan(&self) -> ScanFilter {
        let mut scan = ScanFilter::new()
            .timestamps(self.from_date, self.to_date)
            .versions(self.from_version, self.to_version);
        if let Some(entity_id) = self.entity_id {
            scan = scan.entity(entity_id);
        }
        if let Some(editor) = &self.editor {
            scan = scan.editor(editor.clone());
        }
        scan
    }
}

/// One row of a history page: a version's metadata plus its diff against
/// the immediately preceding version of the same entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// The entity the row belongs to.
    pub entity_id: EntryId,
    /// The row's version.
    pub version: u64,
    /// The row's timestamp.
    pub timestamp: f64,
    /// The acting user.
    pub editor: String,
    /// The edit comment.
    pub message: String,
    /// The kind of write.
    pub operation: Operation,
    /// Diff against the previous version (against emptiness for version 1,
    /// so an added row's diff is all-added entries).
    pub diff: Vec<DiffEntry>,
}

/// A filtered, paginated slice of one resource's combined history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    /// The rows of this page, timestamp ascending.
    pub entries: Vec<HistoryEntry>,
    /// Total matching rows, independent of pagination.
    pub total: usize,
}

/// A request for a diff between two points of one entry's history.
///
/// Each side resolves independently, first match wins:
/// - from: `from_version`, else `from_date` (nearest at/after), else the
///   oldest version
/// - to: `to_version`, else `to_date` (nearest at/before), else
///   `candidate_body` (a body not yet stored), else the current head
#[derive(Debug, Clone, Default)]
pub struct DiffRequest {
    /// Explicit lower version.
    pub from_version: Option<u64>,
    /// Lower bound as a date: nearest version at or after it.
    pub from_date: Option<f64>,
    /// Explicit upper version.
    pub to_version: Option<u64>,
    /// Upper bound as a date: nearest version at or before it.
    pub to_date: Option<f64>,
    /// A caller-supplied body to diff against instead of a stored row.
    pub candidate_body: Option<Value>,
}

/// The result of a [`DiffRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffResult {
    /// The structural diff between the two resolved snapshots.
    pub diff: Vec<DiffEntry>,
    /// The resolved lower version.
    pub from_version: u64,
    /// The resolved upper version; `None` when the upper side was a
    /// candidate body.
    pub to_version: Option<u64>,
}

/// Read-only query engine over the ledger.
pub struct HistoryEngine {
    ledger: Arc<Ledger>,
}

impl HistoryEngine {
    /// Creates a history engine over a ledger.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Answers a filtered, paginated history request.
    ///
    /// Rows come back in timestamp order, ascending, sliced to
    /// `page * page_size .. + page_size`. Each row carries its diff
    /// against the immediately preceding version of the same entity.
    pub fn get_history(
        &self,
        partition: &str,
        filter: &HistoryFilter,
        page: usize,
        page_size: usize,
    ) -> CoreResult<HistoryPage> {
        let scan = filter.to_scan();
        let total = self.ledger.count(partition, &scan)?;

        let paged = scan.paginate(page * page_size, Some(page_size));
        let mut entries = Vec::new();
        for row in self.ledger.scan(partition, &paged)? {
            let row = row?;
            let diff = self.diff_against_previous(partition, &row)?;
            entries.push(HistoryEntry {
                entity_id: row.entity_id,
                version: row.version,
                timestamp: row.timestamp,
                editor: row.editor,
                message: row.message,
                operation: row.operation,
                diff,
            });
        }

        Ok(HistoryPage { entries, total })
    }

    /// Computes a diff between two points of one entry's history.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DiffImpossible` if either side resolves to no
    /// snapshot, e.g. a `to_date` before the entity existed.
    pub fn get_entry_diff(
        &self,
        partition: &str,
        entity_id: EntryId,
        request: &DiffRequest,
    ) -> CoreResult<DiffResult> {
        let from = self.resolve_from(partition, &entity_id, request)?;

        // A candidate body stands in for the upper side only when no
        // stored snapshot is named.
        if request.to_version.is_none() && request.to_date.is_none() {
            if let Some(candidate) = &request.candidate_body {
                return Ok(DiffResult {
                    diff: diff(&from.body, candidate),
                    from_version: from.version,
                    to_version: None,
                });
            }
        }

        let to = self.resolve_to(partition, &entity_id, request)?;
        Ok(DiffResult {
            diff: diff(&from.body, &to.body),
            from_version: from.version,
            to_version: Some(to.version),
        })
    }

    fn resolve_from(
        &self,
        partition: &str,
        entity_id: &EntryId,
        request: &DiffRequest,
    ) -> CoreResult<EntryVersion> {
        let resolved = if let Some(version) = request.from_version {
            self.ledger.at_version(partition, entity_id, version)?
        } else if let Some(date) = request.from_date {
            self.ledger.at_or_after(partition, entity_id, date)?
        } else {
            self.ledger.at_version(partition, entity_id, 1)?
        };
        resolved.ok_or_else(|| {
            CoreError::diff_impossible(format!(
                "no snapshot for the lower side of entity {entity_id}"
            ))
        })
    }

    fn resolve_to(
        &self,
        partition: &str,
        entity_id: &EntryId,
        request: &DiffRequest,
    ) -> CoreResult<EntryVersion> {
        let resolved = if let Some(version) = request.to_version {
            self.ledger.at_version(partition, entity_id, version)?
        } else if let Some(date) = request.to_date {
            self.ledger.at_or_before(partition, entity_id, date)?
        } else {
            self.ledger.head(partition, entity_id)?
        };
        resolved.ok_or_else(|| {
            CoreError::diff_impossible(format!(
                "no snapshot for the upper side of entity {entity_id}"
            ))
        })
    }

    fn diff_against_previous(
        &self,
        partition: &str,
        row: &EntryVersion,
    ) -> CoreResult<Vec<DiffEntry>> {
        let previous_body = if row.version > 1 {
            self.ledger
                .at_version(partition, &row.entity_id, row.version - 1)?
                .map(|prev| prev.body)
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
        } else {
            Value::Object(serde_json::Map::new())
        };
        Ok(diff(&previous_body, &row.body))
    }
}

impl std::fmt::Debug for HistoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEngine").finish_non_exhaustive()
    }
}
