//! Ember Dev Server
//!
//! Owns the locally spawned development server used in development mode
//! and the HTTP forwarder that talks to it (or to any other local service).

mod config;
mod error;
mod server;
mod upstream;

pub use config::{DevServerConfig, DEFAULT_DEV_PORT};
pub use error::DevServerError;
pub use server::DevServer;
pub use upstream::HttpUpstream;

pub type Result<T> = std::result::Result<T, DevServerError>;
