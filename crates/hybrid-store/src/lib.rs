//! hybrid-store - SQLite storage layer
//!
//! This crate persists documents, their dense and sparse vectors, and the
//! fitted sparse vocabulary in SQLite. Nearest-neighbour queries are an exact
//! cosine scan over each vector space.

mod codec;
mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};
