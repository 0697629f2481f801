//! Dev server error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevServerError {
    #[error("Failed to spawn dev server `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Dev server never bound {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Dev server did not accept connections on {addr} within {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("Invalid dev server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
