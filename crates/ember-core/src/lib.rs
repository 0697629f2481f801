//! Ember Core
//!
//! Per-request dispatch for the embedded browser surface, and the startup
//! sequence that wires storage, the cookie bridge, the SSR bundle, static
//! assets and (in development) the dev server together.

mod config;
mod diagnostics;
mod dispatcher;
mod error;
mod shell;

pub use config::{Config, APP_NAME, DEFAULT_PORT};
pub use dispatcher::{DispatchError, DispatchState, Dispatched, RequestDispatcher};
pub use error::CoreError;
pub use shell::Shell;

// Re-export the types hosts need to drive the shell
pub use ember_bundle::{LoadContext, Mode, ModuleRegistry, RenderContext, RouteModule};
pub use ember_protocol::{Body, Request, Response};
pub use ember_session::{CookieRecord, CookieStore, MemoryCookieStore};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
