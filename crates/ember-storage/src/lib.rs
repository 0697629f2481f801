//! Ember Storage Layer
//!
//! SQLite persistence for shell state that must survive restarts.
//! Today that is the session cookie jar.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
