//! Forwarding error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Upstream {url} unavailable: {message}")]
    Unavailable { url: String, message: String },

    #[error("Invalid upstream request: {0}")]
    InvalidRequest(String),

    #[error("Failed to read request body: {0}")]
    Body(#[from] std::io::Error),
}
