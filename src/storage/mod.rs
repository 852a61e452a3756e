//! Storage layer
//!
//! SQLite holds both the document collection and the durable copy of the
//! embedding store.

pub mod migrations;
pub mod sqlite;

pub use sqlite::Database;
