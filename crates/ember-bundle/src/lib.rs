//! Ember Bundle
//!
//! Loads the server-side rendering bundle produced by the application build
//! and turns it into a [`Bundle`] that is valid by construction: whatever
//! cannot be loaded or validated is patched from a minimal fallback, so the
//! rest of the shell never sees a partially valid bundle.
//!
//! [`SsrInvoker`] wraps the bundle's entry module and route tree behind a
//! single `render` call whose failures are always a [`RenderError`].

mod assemble;
mod error;
mod fallback;
mod invoker;
mod loader;
mod matcher;
mod model;
mod module;
mod raw;

pub use error::{BundleLoadError, RenderError};
pub use invoker::{LoadContext, SsrInvoker};
pub use loader::{BundleLoader, BundleSource};
pub use model::{
    AssetManifest, Bundle, BundleOrigin, EntryAsset, EntryRef, Mode, ModuleRef, RouteAsset,
    RouteNode, RouteTree,
};
pub use module::{
    DocumentContext, DocumentEntry, EntryModule, Markup, ModuleRegistry, RenderContext,
    RenderedRoute, RouteModule, StartingEntry, OUTLET,
};

pub type Result<T> = std::result::Result<T, BundleLoadError>;
