//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] ember_storage::StorageError),

    #[error("Cookie header is not valid: {0}")]
    InvalidHeader(String),

    #[error("Cookie store unavailable: {0}")]
    Unavailable(String),

    #[error("Cookie store task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for SessionError {
    fn from(err: rusqlite::Error) -> Self {
        SessionError::Storage(err.into())
    }
}
