//! # VerDB Testkit
//!
//! Test utilities for VerDB.
//!
//! This crate provides:
//! - Test fixtures and store helpers
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use serde_json::json;
//! use verdb_testkit::with_store;
//!
//! with_store(|store| {
//!     let created = store
//!         .add("cities", json!({"name": "Berlin"}), "alice", "", None)
//!         .unwrap();
//!     assert_eq!(created.version, 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;
