//! Bundle data model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::module::{EntryModule, RouteModule};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Mode::Development)
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

/// A resolved route module together with the specifier it came from.
/// Two refs are equal when their specifiers are.
#[derive(Clone)]
pub struct ModuleRef {
    specifier: String,
    module: Arc<dyn RouteModule>,
}

impl ModuleRef {
    pub fn new(specifier: impl Into<String>, module: Arc<dyn RouteModule>) -> Self {
        Self {
            specifier: specifier.into(),
            module,
        }
    }

    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    pub fn module(&self) -> &dyn RouteModule {
        self.module.as_ref()
    }
}

impl PartialEq for ModuleRef {
    fn eq(&self, other: &Self) -> bool {
        self.specifier == other.specifier
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleRef").field(&self.specifier).finish()
    }
}

#[derive(Clone)]
pub struct EntryRef {
    specifier: String,
    module: Arc<dyn EntryModule>,
}

impl EntryRef {
    pub fn new(specifier: impl Into<String>, module: Arc<dyn EntryModule>) -> Self {
        Self {
            specifier: specifier.into(),
            module,
        }
    }

    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    pub fn module(&self) -> &dyn EntryModule {
        self.module.as_ref()
    }
}

impl PartialEq for EntryRef {
    fn eq(&self, other: &Self) -> bool {
        self.specifier == other.specifier
    }
}

impl fmt::Debug for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryRef").field(&self.specifier).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteNode {
    pub id: String,
    /// `None` only for the root
    pub parent_id: Option<String>,
    pub path: String,
    pub index: bool,
    pub module: ModuleRef,
}

/// Route hierarchy. Holds exactly one root and at least one route, every
/// route reachable from the root through `parent_id`, ids unique.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTree {
    root: RouteNode,
    routes: Vec<RouteNode>,
}

impl RouteTree {
    /// Callers must have validated the tree.
    pub(crate) fn from_validated(root: RouteNode, routes: Vec<RouteNode>) -> Self {
        debug_assert!(root.parent_id.is_none());
        debug_assert!(!routes.is_empty());
        Self { root, routes }
    }

    pub fn root(&self) -> &RouteNode {
        &self.root
    }

    pub fn routes(&self) -> &[RouteNode] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn children<'a, 'b>(&'a self, parent_id: &'b str) -> impl Iterator<Item = &'a RouteNode> + 'b
    where
        'a: 'b,
    {
        self.routes
            .iter()
            .filter(move |r| r.parent_id.as_deref() == Some(parent_id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryAsset {
    pub module: String,
    #[serde(default)]
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAsset {
    pub id: String,
    pub module: String,
    #[serde(default)]
    pub imports: Vec<String>,
}

/// Client-side asset manifest emitted by the build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub url: String,
    pub version: String,
    #[serde(default)]
    pub entry: Option<EntryAsset>,
    #[serde(default)]
    pub routes: BTreeMap<String, RouteAsset>,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            url: "/assets/".to_string(),
            version: "1.0.0".to_string(),
            entry: None,
            routes: BTreeMap::new(),
        }
    }
}

/// Where a bundle's structure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleOrigin {
    /// Artifact loaded and valid as-is
    Loaded,
    /// Artifact loaded, structural gaps filled from the fallback
    Patched,
    /// Synthetic fallback only
    Fallback,
}

/// A server bundle that satisfies the route-tree invariant.
///
/// Only produced by [`crate::BundleLoader`] and [`Bundle::fallback`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub(crate) entry: EntryRef,
    pub(crate) routes: RouteTree,
    pub(crate) assets: AssetManifest,
    pub(crate) mode: Mode,
    pub(crate) public_path: String,
    pub(crate) origin: BundleOrigin,
}

impl Bundle {
    pub fn entry(&self) -> &EntryRef {
        &self.entry
    }

    pub fn routes(&self) -> &RouteTree {
        &self.routes
    }

    pub fn assets(&self) -> &AssetManifest {
        &self.assets
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    pub fn origin(&self) -> BundleOrigin {
        self.origin
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == BundleOrigin::Fallback
    }
}
