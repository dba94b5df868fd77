//! Insurance Chat storage crate - the persistent key-value store boundary.
//!
//! Provides the `KeyValueStore` trait used by the session state manager,
//! an in-memory implementation, and a WAL-mode SQLite implementation with
//! schema migrations.

pub mod db;
pub mod kv;
pub mod migrations;

pub use db::Database;
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
