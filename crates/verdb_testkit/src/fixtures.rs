//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores and
//! common seeding scenarios.

use serde_json::{json, Value};
use std::sync::Arc;
use verdb_core::{EntryId, StepClock, VersionStore};
use verdb_storage::MemoryBackend;

/// A test store over an in-memory backend.
pub struct TestStore {
    /// The store instance.
    pub store: VersionStore,
}

impl TestStore {
    /// Creates a test store with a real monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: VersionStore::open_in_memory(),
        }
    }

    /// Creates a test store whose clock starts at `start` seconds and
    /// advances by `step` on every write, for date-based assertions.
    #[must_use]
    pub fn with_step_clock(start: f64, step: f64) -> Self {
        Self {
            store: VersionStore::open_with_clock(
                Arc::new(MemoryBackend::new()),
                Arc::new(StepClock::new(start, step)),
            ),
        }
    }

    /// Adds an entry and applies `updates` sequential updates to it,
    /// bodies `{"n": 1}` through `{"n": updates + 1}`. Returns its id.
    pub fn seed_versions(&self, resource: &str, updates: u64) -> EntryId {
        let created = self
            .store
            .add(resource, json!({"n": 1}), "seeder", "seed", None)
            .expect("seed add failed");
        for v in 1..=updates {
            self.store
                .update(
                    resource,
                    created.entity_id,
                    v,
                    json!({"n": v + 1}),
                    "seeder",
                    format!("seed update {v}"),
                )
                .expect("seed update failed");
        }
        created.entity_id
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = VersionStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test against a fresh in-memory store.
pub fn with_store<F: FnOnce(&VersionStore)>(f: F) {
    let fixture = TestStore::new();
    f(&fixture.store);
}

/// A small flat body, the common case for history consumers.
#[must_use]
pub fn city_body(name: &str, population: u64) -> Value {
    json!({"name": name, "population": population})
}

/// A nested body exercising dotted diff paths.
#[must_use]
pub fn person_body(name: &str, city: &str) -> Value {
    json!({
        "name": name,
        "address": {"city": city, "zip": "10115"},
        "tags": ["a", "b"],
    })
}
