//! Entry identity.

mod id;

pub use id::EntryId;
