//! Structural diff between entry bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// One difference between two bodies, located by a dot-separated field
/// path (e.g. `address.city`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiffEntry {
    /// The field exists only in the newer body.
    #[serde(rename = "ADDED")]
    Added {
        /// Dotted path to the field.
        field: String,
        /// The value in the newer body.
        after: Value,
    },
    /// The field exists only in the older body.
    #[serde(rename = "REMOVED")]
    Removed {
        /// Dotted path to the field.
        field: String,
        /// The value in the older body.
        before: Value,
    },
    /// The field exists in both bodies with different values.
    #[serde(rename = "CHANGE")]
    Changed {
        /// Dotted path to the field.
        field: String,
        /// The value in the older body.
        before: Value,
        /// The value in the newer body.
        after: Value,
    },
}

impl DiffEntry {
    /// Returns the dotted field path this entry refers to.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Added { field, .. } | Self::Removed { field, .. } | Self::Changed { field, .. } => {
                field
            }
        }
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { field, .. } => write!(f, "+{field}"),
            Self::Removed { field, .. } => write!(f, "-{field}"),
            Self::Changed { field, .. } => write!(f, "~{field}"),
        }
    }
}

/// Computes the structural diff between two bodies.
///
/// Bodies are treated as trees of maps, lists, and scalars. At each map
/// level the union of keys is walked:
/// - key only in `after` emits [`DiffEntry::Added`]
/// - key only in `before` emits [`DiffEntry::Removed`]
/// - both values maps: recurse, prefixing child paths with the key
/// - values differ otherwise (lists and scalars compared as opaque
///   values): emits [`DiffEntry::Changed`]
/// - values equal: nothing
///
/// Entries are emitted in sorted key order at each level, which is the
/// iteration order of `serde_json` objects. For flat bodies this
/// degenerates to one `Changed` entry per differing top-level field.
///
/// Non-map roots compare as opaque values under the empty field path.
#[must_use]
pub fn diff(before: &Value, after: &Value) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => diff_maps(b, a, "", &mut entries),
        _ if before == after => {}
        _ => entries.push(DiffEntry::Changed {
            field: String::new(),
            before: before.clone(),
            after: after.clone(),
        }),
    }
    entries
}

fn diff_maps(before: &Map<String, Value>, after: &Map<String, Value>, prefix: &str, out: &mut Vec<DiffEntry>) {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    for key in keys {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match (before.get(key), after.get(key)) {
            (None, Some(a)) => out.push(DiffEntry::Added {
                field: path,
                after: a.clone(),
            }),
            (Some(b), None) => out.push(DiffEntry::Removed {
                field: path,
                before: b.clone(),
            }),
            (Some(Value::Object(b)), Some(Value::Object(a))) => diff_maps(b, a, &path, out),
            (Some(b), Some(a)) if b != a => out.push(DiffEntry::Changed {
                field: path,
                before: b.clone(),
                after: a.clone(),
            }),
            _ => {}
        }
    }
}
