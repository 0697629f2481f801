//! Synthetic fallback bundle

use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::model::{
    AssetManifest, Bundle, BundleOrigin, EntryRef, Mode, ModuleRef, RouteNode, RouteTree,
};
use crate::module::{Markup, Passthrough, StartingEntry};

const APP_NAME: &str = "Ember";

pub(crate) const ROOT_ID: &str = "root";
pub(crate) const INDEX_ID: &str = "routes/index";

static FALLBACK: Lazy<Bundle> = Lazy::new(|| {
    tracing::debug!("Building fallback server bundle");

    let root = RouteNode {
        id: ROOT_ID.to_string(),
        parent_id: None,
        path: String::new(),
        index: false,
        module: ModuleRef::new("fallback:root", Arc::new(Passthrough)),
    };
    let index = RouteNode {
        id: INDEX_ID.to_string(),
        parent_id: Some(ROOT_ID.to_string()),
        path: String::new(),
        index: true,
        module: ModuleRef::new(
            "fallback:index",
            Arc::new(Markup::new("<p>Loading application...</p>")),
        ),
    };

    Bundle {
        entry: EntryRef::new("fallback:starting", Arc::new(StartingEntry::new(APP_NAME))),
        routes: RouteTree::from_validated(root, vec![index]),
        assets: AssetManifest::default(),
        mode: Mode::Production,
        public_path: "/".to_string(),
        origin: BundleOrigin::Fallback,
    }
});

impl Bundle {
    /// The minimal bundle used when the real artifact is unusable. Built
    /// once per process; clones share its modules.
    pub fn fallback() -> Bundle {
        FALLBACK.clone()
    }
}

pub(crate) fn fallback_routes() -> &'static RouteTree {
    &FALLBACK.routes
}
