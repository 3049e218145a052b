//! Database module: SQL repositories over the local SQLite file.
//!
//! `repo` holds SQL-only functions that map rows into the entities from
//! `crate::model`. Callers that need change notifications should go through
//! `crate::store::Store` instead.

pub mod repo;

pub use repo::*;
