//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] ember_storage::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] ember_session::SessionError),

    #[error("Asset error: {0}")]
    Asset(#[from] ember_assets::AssetError),

    #[error("Dev server error: {0}")]
    DevServer(#[from] ember_devserver::DevServerError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
