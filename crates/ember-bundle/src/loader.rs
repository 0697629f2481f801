//! Server bundle loader

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::assemble::PartialBundle;
use crate::error::BundleLoadError;
use crate::model::{Bundle, EntryRef, Mode, ModuleRef, RouteNode};
use crate::module::{DocumentEntry, Markup, ModuleRegistry, Passthrough, RouteModule};
use crate::raw::{RawBundle, RawEntry, RawRoute};
use crate::Result;

/// Location of the bundle artifact and the mode the shell runs in
#[derive(Debug, Clone)]
pub struct BundleSource {
    pub path: PathBuf,
    pub mode: Mode,
}

impl BundleSource {
    pub fn new(path: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

pub struct BundleLoader {
    source: BundleSource,
    registry: ModuleRegistry,
}

impl BundleLoader {
    pub fn new(source: BundleSource, registry: ModuleRegistry) -> Self {
        Self { source, registry }
    }

    /// Load the bundle. Never fails: anything that goes wrong is logged and
    /// answered with (part of) the fallback bundle.
    pub async fn load(&self) -> Bundle {
        if self.source.mode.is_development() {
            tracing::info!("Development mode: using fallback server bundle");
            return Bundle::fallback();
        }

        tracing::info!(path = %self.source.path.display(), "Loading server bundle");

        match self.try_load().await {
            Ok(bundle) => {
                tracing::info!(
                    origin = ?bundle.origin(),
                    root = %bundle.routes().root().id,
                    routes = bundle.routes().len(),
                    version = %bundle.assets().version,
                    "Server bundle ready"
                );
                bundle
            }
            Err(e) => {
                tracing::error!(
                    path = %self.source.path.display(),
                    error = %e,
                    details = ?e,
                    "Failed to load server bundle - using fallback"
                );
                Bundle::fallback()
            }
        }
    }

    async fn try_load(&self) -> Result<Bundle> {
        let bytes = tokio::fs::read(&self.source.path)
            .await
            .map_err(|source| BundleLoadError::Read {
                path: self.source.path.clone(),
                source,
            })?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        let raw = RawBundle::from_value(value)?;

        let root = match raw.root {
            Some(raw_root) => self.resolve_route(raw_root).await,
            None => None,
        };
        let routes = match raw.routes {
            Some(raw_routes) => {
                let mut resolved = Vec::with_capacity(raw_routes.len());
                for raw_route in raw_routes {
                    if let Some(route) = self.resolve_route(raw_route).await {
                        resolved.push(route);
                    }
                }
                Some(resolved)
            }
            None => None,
        };

        Ok(Bundle::assemble(PartialBundle {
            entry: raw.entry.and_then(|entry| self.resolve_entry(entry)),
            root,
            routes,
            assets: raw.assets,
            mode: raw.mode,
            public_path: raw.public_path,
        }))
    }

    fn resolve_entry(&self, entry: RawEntry) -> Option<EntryRef> {
        match entry.module.as_deref() {
            None | Some("document") => Some(EntryRef::new("document", Arc::new(DocumentEntry))),
            Some(specifier) => match specifier.strip_prefix("native:") {
                Some(name) => match self.registry.entry(name) {
                    Some(module) => Some(EntryRef::new(specifier, module)),
                    None => {
                        tracing::warn!(specifier, "Unknown native entry module");
                        None
                    }
                },
                None => {
                    tracing::warn!(specifier, "Unsupported entry module specifier");
                    None
                }
            },
        }
    }

    async fn resolve_route(&self, raw: RawRoute) -> Option<RouteNode> {
        let Some(id) = raw.id.filter(|id| !id.is_empty()) else {
            tracing::warn!("Dropping route without id");
            return None;
        };

        let module = match raw.module.as_deref() {
            None => ModuleRef::new("passthrough", Arc::new(Passthrough)),
            Some(specifier) => match self.resolve_module(specifier).await {
                Ok(module) => module,
                Err(e) => {
                    tracing::warn!(route = %id, error = %e, "Dropping route with unresolvable module");
                    return None;
                }
            },
        };

        Some(RouteNode {
            id,
            parent_id: raw.parent_id.filter(|p| !p.is_empty()),
            path: raw.path.unwrap_or_default(),
            index: raw.index,
            module,
        })
    }

    async fn resolve_module(&self, specifier: &str) -> Result<ModuleRef> {
        let err = |reason: String| BundleLoadError::Module {
            specifier: specifier.to_string(),
            reason,
        };

        let module: Arc<dyn RouteModule> = match specifier.split_once(':') {
            Some(("native", name)) => self
                .registry
                .route(name)
                .ok_or_else(|| err("no native module registered under that name".to_string()))?,
            Some(("text", literal)) => Arc::new(Markup::new(literal)),
            Some(("html", relative)) => {
                let path = sandboxed_join(self.source.base_dir(), relative)
                    .ok_or_else(|| err("path escapes the bundle directory".to_string()))?;
                let markup = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| err(format!("{}: {}", path.display(), e)))?;
                Arc::new(Markup::new(markup))
            }
            _ => return Err(err("unknown module scheme".to_string())),
        };

        Ok(ModuleRef::new(specifier, module))
    }
}

/// Join a relative module path onto the bundle directory, refusing anything
/// that could leave it.
fn sandboxed_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut out = base.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BundleOrigin;
    use std::fs;
    use tempfile::TempDir;

    fn write_bundle(dir: &TempDir, json: &str) -> BundleSource {
        let server = dir.path().join("server");
        fs::create_dir_all(&server).unwrap();
        let path = server.join("index.json");
        fs::write(&path, json).unwrap();
        BundleSource::new(path, Mode::Production)
    }

    const VALID: &str = r#"{
        "entry": { "module": "document" },
        "routes": {
            "root": { "id": "root", "path": "", "module": "html:root.html" },
            "routes": [
                { "id": "routes/_index", "parentId": "root", "index": true, "module": "html:routes/index.html" },
                { "id": "routes/chat", "parentId": "root", "path": "chat/:id", "module": "text:<p>chat</p>" }
            ]
        },
        "assets": { "url": "/assets/manifest.js", "version": "abc123" },
        "mode": "production",
        "publicPath": "/build/"
    }"#;

    fn valid_bundle_dir() -> (TempDir, BundleSource) {
        let dir = tempfile::tempdir().unwrap();
        let source = write_bundle(&dir, VALID);
        let server = dir.path().join("server");
        fs::write(server.join("root.html"), "<main><!--outlet--></main>").unwrap();
        fs::create_dir_all(server.join("routes")).unwrap();
        fs::write(server.join("routes/index.html"), "<h1>Home</h1>").unwrap();
        (dir, source)
    }

    #[tokio::test]
    async fn test_development_mode_uses_fallback() {
        let (_dir, mut source) = valid_bundle_dir();
        source.mode = Mode::Development;

        let bundle = BundleLoader::new(source, ModuleRegistry::new()).load().await;
        assert!(bundle.is_fallback());
    }

    #[tokio::test]
    async fn test_missing_artifact_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let source = BundleSource::new(dir.path().join("server/index.json"), Mode::Production);

        let bundle = BundleLoader::new(source, ModuleRegistry::new()).load().await;
        assert!(bundle.is_fallback());
        assert_eq!(bundle.routes().root().id, "root");
    }

    #[tokio::test]
    async fn test_invalid_json_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_bundle(&dir, "export default {");

        let bundle = BundleLoader::new(source, ModuleRegistry::new()).load().await;
        assert!(bundle.is_fallback());
    }

    #[tokio::test]
    async fn test_valid_bundle_loads() {
        let (_dir, source) = valid_bundle_dir();

        let bundle = BundleLoader::new(source, ModuleRegistry::new()).load().await;
        assert_eq!(bundle.origin(), BundleOrigin::Loaded);
        assert_eq!(bundle.routes().len(), 2);
        assert_eq!(bundle.assets().version, "abc123");
        assert_eq!(bundle.public_path(), "/build/");
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let (_dir, source) = valid_bundle_dir();
        let loader = BundleLoader::new(source, ModuleRegistry::new());

        let first = loader.load().await;
        let second = loader.load().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_routes_missing_salvages_assets() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_bundle(
            &dir,
            r#"{ "assets": { "url": "/assets/", "version": "7.7.7" }, "publicPath": "/static/" }"#,
        );

        let bundle = BundleLoader::new(source, ModuleRegistry::new()).load().await;
        assert_eq!(bundle.origin(), BundleOrigin::Patched);
        assert_eq!(bundle.routes().root().id, "root");
        assert!(bundle.routes().len() >= 1);
        assert_eq!(bundle.assets().version, "7.7.7");
        assert_eq!(bundle.public_path(), "/static/");
    }

    #[tokio::test]
    async fn test_routes_empty_uses_fallback_routes() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_bundle(
            &dir,
            r#"{ "routes": { "root": { "id": "app", "module": "text:x" }, "routes": [] } }"#,
        );

        let bundle = BundleLoader::new(source, ModuleRegistry::new()).load().await;
        assert_eq!(bundle.routes().root().id, "root");
        assert!(bundle.routes().len() >= 1);
    }

    #[tokio::test]
    async fn test_unresolvable_modules_drop_routes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("secret.html"), "<p>outside</p>").unwrap();
        let source = write_bundle(
            &dir,
            r#"{
                "routes": {
                    "root": { "id": "root" },
                    "routes": [
                        { "id": "escape", "parentId": "root", "module": "html:../secret.html" },
                        { "id": "unknown", "parentId": "root", "module": "native:missing" },
                        { "id": "ok", "parentId": "root", "module": "native:home" }
                    ]
                }
            }"#,
        );
        let registry =
            ModuleRegistry::new().with_route_fn("home", |_ctx| Ok(Some("<p>home</p>".to_string())));

        let bundle = BundleLoader::new(source, registry).load().await;
        let ids: Vec<&str> = bundle.routes().routes().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
    }

    #[test]
    fn test_sandboxed_join() {
        let base = Path::new("/app/build/server");
        assert_eq!(
            sandboxed_join(base, "./routes/a.html"),
            Some(PathBuf::from("/app/build/server/routes/a.html"))
        );
        assert!(sandboxed_join(base, "../client/x.html").is_none());
        assert!(sandboxed_join(base, "/etc/passwd").is_none());
    }
}
