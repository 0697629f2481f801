//! Ember Assets
//!
//! Serves the packaged client build from a fixed sandbox directory.
//! Anything that would resolve outside the sandbox is a plain miss.

mod error;
mod server;

pub use error::AssetError;
pub use server::AssetServer;

pub type Result<T> = std::result::Result<T, AssetError>;
