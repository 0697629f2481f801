//! The one place a [`Bundle`] is put together from loaded parts

use std::collections::HashSet;
use std::sync::Arc;

use crate::fallback::{fallback_routes, ROOT_ID};
use crate::model::{AssetManifest, Bundle, BundleOrigin, EntryRef, Mode, RouteNode, RouteTree};
use crate::module::DocumentEntry;

/// Whatever survived decoding and module resolution
#[derive(Default)]
pub(crate) struct PartialBundle {
    pub entry: Option<EntryRef>,
    pub root: Option<RouteNode>,
    pub routes: Option<Vec<RouteNode>>,
    pub assets: Option<AssetManifest>,
    pub mode: Option<Mode>,
    pub public_path: Option<String>,
}

impl Bundle {
    /// Validate `partial` and patch its structural gaps from the fallback.
    ///
    /// Missing or empty routes replace root and routes together, since the
    /// fallback routes hang off the fallback root. Non-structural fields are
    /// kept whenever they decoded.
    pub(crate) fn assemble(partial: PartialBundle) -> Bundle {
        let PartialBundle {
            entry,
            root,
            routes,
            assets,
            mode,
            public_path,
        } = partial;

        let mut patched = false;
        let routes = routes.unwrap_or_default();

        let tree = if routes.is_empty() {
            tracing::warn!("Server bundle is missing routes - using fallback routes");
            patched = true;
            fallback_routes().clone()
        } else {
            let (root, routes) = match root {
                Some(mut root) => {
                    root.parent_id = None;
                    (root, routes)
                }
                None => {
                    patched = true;
                    adopt_root(routes)
                }
            };

            let (routes, dropped) = validate_routes(&root, routes);
            if dropped > 0 {
                patched = true;
            }

            if routes.is_empty() {
                tracing::warn!("No valid routes left in server bundle - using fallback routes");
                patched = true;
                fallback_routes().clone()
            } else {
                RouteTree::from_validated(root, routes)
            }
        };

        let uses_fallback_tree = &tree == fallback_routes();
        let entry = match entry {
            Some(entry) => entry,
            None if uses_fallback_tree => Bundle::fallback().entry,
            None => EntryRef::new("document", Arc::new(DocumentEntry)),
        };

        let origin = if patched {
            BundleOrigin::Patched
        } else {
            BundleOrigin::Loaded
        };

        Bundle {
            entry,
            routes: tree,
            assets: assets.unwrap_or_default(),
            mode: mode.unwrap_or_default(),
            public_path: public_path.unwrap_or_else(|| "/".to_string()),
            origin,
        }
    }
}

/// No root was given: promote the first parentless route, else use the
/// fallback root.
fn adopt_root(mut routes: Vec<RouteNode>) -> (RouteNode, Vec<RouteNode>) {
    if let Some(pos) = routes.iter().position(|r| r.parent_id.is_none()) {
        let root = routes.remove(pos);
        tracing::warn!(root = %root.id, "Server bundle has no root route - promoting parentless route");
        return (root, routes);
    }

    tracing::warn!("Server bundle has no root route - using fallback root");
    let root = fallback_routes().root().clone();
    debug_assert_eq!(root.id, ROOT_ID);
    (root, routes)
}

/// Drop duplicates and routes that do not hang off `root`. Returns the
/// surviving routes (original order) and how many were dropped.
fn validate_routes(root: &RouteNode, routes: Vec<RouteNode>) -> (Vec<RouteNode>, usize) {
    let mut dropped = 0;
    let mut seen: HashSet<String> = HashSet::from([root.id.clone()]);
    let mut unique = Vec::with_capacity(routes.len());

    for mut route in routes {
        if route.id == root.id && route.parent_id.is_none() {
            // Route maps commonly repeat the root
            continue;
        }
        if !seen.insert(route.id.clone()) {
            tracing::warn!(route = %route.id, "Dropping duplicate route id");
            dropped += 1;
            continue;
        }
        if route.parent_id.is_none() {
            tracing::debug!(route = %route.id, parent = %root.id, "Attaching parentless route to root");
            route.parent_id = Some(root.id.clone());
        }
        unique.push(route);
    }

    let mut reachable: HashSet<String> = HashSet::from([root.id.clone()]);
    loop {
        let before = reachable.len();
        for route in &unique {
            if route
                .parent_id
                .as_ref()
                .is_some_and(|parent| reachable.contains(parent))
            {
                reachable.insert(route.id.clone());
            }
        }
        if reachable.len() == before {
            break;
        }
    }

    unique.retain(|route| {
        let keep = reachable.contains(&route.id);
        if !keep {
            tracing::warn!(
                route = %route.id,
                parent = ?route.parent_id,
                "Dropping route whose parent does not exist"
            );
            dropped += 1;
        }
        keep
    });

    (unique, dropped)
}
