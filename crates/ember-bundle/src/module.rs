//! Render module contracts and the built-in modules

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ember_protocol::{HeaderMap, Method, Response, StatusCode, Url};

use crate::invoker::LoadContext;
use crate::model::AssetManifest;

/// Placeholder a parent route's markup uses to mark where its child goes
pub const OUTLET: &str = "<!--outlet-->";

/// Everything a route module sees while rendering one request
pub struct RenderContext<'a> {
    pub route_id: &'a str,
    pub method: &'a Method,
    pub url: &'a Url,
    pub headers: &'a HeaderMap,
    pub params: &'a BTreeMap<String, String>,
    pub body: &'a [u8],
    pub load_context: &'a LoadContext,
}

/// Renders one route of the tree to markup. `None` renders nothing and lets
/// the child's markup pass through unchanged.
pub trait RouteModule: Send + Sync {
    fn render(&self, ctx: &RenderContext<'_>) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRoute {
    pub id: String,
    pub markup: Option<String>,
}

/// Input to the entry module: the matched route chain, root first
pub struct DocumentContext<'a> {
    pub status: StatusCode,
    pub url: &'a Url,
    pub chain: Vec<RenderedRoute>,
    pub assets: &'a AssetManifest,
    pub public_path: &'a str,
    pub load_context: &'a LoadContext,
}

impl DocumentContext<'_> {
    /// Nest the chain's markup leaf-first: a parent containing [`OUTLET`]
    /// receives its child there, any other parent is prepended.
    pub fn compose(&self) -> String {
        let mut body = String::new();
        for route in self.chain.iter().rev() {
            match &route.markup {
                None => {}
                Some(markup) if markup.contains(OUTLET) => {
                    body = markup.replacen(OUTLET, &body, 1);
                }
                Some(markup) => body = format!("{}{}", markup, body),
            }
        }
        body
    }

    fn asset_href(&self, module: &str) -> String {
        if module.starts_with('/') || module.contains("://") {
            module.to_string()
        } else {
            format!("{}/{}", self.public_path.trim_end_matches('/'), module)
        }
    }
}

/// Turns the rendered route chain into the HTTP response.
pub trait EntryModule: Send + Sync {
    fn render_document(&self, doc: DocumentContext<'_>) -> anyhow::Result<Response>;
}

/// Route module with fixed markup: prerendered files and inline literals
#[derive(Debug, Clone)]
pub struct Markup(Arc<str>);

impl Markup {
    pub fn new(markup: impl Into<Arc<str>>) -> Self {
        Self(markup.into())
    }
}

impl RouteModule for Markup {
    fn render(&self, _ctx: &RenderContext<'_>) -> anyhow::Result<Option<String>> {
        Ok(Some(self.0.to_string()))
    }
}

/// Layout without markup of its own
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Passthrough;

impl RouteModule for Passthrough {
    fn render(&self, _ctx: &RenderContext<'_>) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

struct FnModule<F>(F);

impl<F> RouteModule for FnModule<F>
where
    F: Fn(&RenderContext<'_>) -> anyhow::Result<Option<String>> + Send + Sync,
{
    fn render(&self, ctx: &RenderContext<'_>) -> anyhow::Result<Option<String>> {
        (self.0)(ctx)
    }
}

/// Default entry: wraps the composed chain in an HTML document that pulls in
/// the client entry and the matched routes' modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentEntry;

impl EntryModule for DocumentEntry {
    fn render_document(&self, doc: DocumentContext<'_>) -> anyhow::Result<Response> {
        let body = doc.compose();

        let trimmed = body.trim_start();
        let is_full_document = trimmed
            .get(..9)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"))
            || trimmed.starts_with("<html");
        if is_full_document {
            return Ok(Response::html(doc.status, body));
        }

        let mut head = String::new();
        for route in &doc.chain {
            if let Some(asset) = doc.assets.routes.get(&route.id) {
                head.push_str(&format!(
                    "<link rel=\"modulepreload\" href=\"{}\">\n",
                    doc.asset_href(&asset.module)
                ));
            }
        }
        if let Some(entry) = &doc.assets.entry {
            head.push_str(&format!(
                "<script type=\"module\" src=\"{}\"></script>\n",
                doc.asset_href(&entry.module)
            ));
        }

        let page = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             {head}</head>\n<body>\n{body}\n</body>\n</html>\n"
        );
        Ok(Response::html(doc.status, page))
    }
}

/// Entry of the fallback bundle: a fixed "starting" page
#[derive(Debug, Clone)]
pub struct StartingEntry {
    app_name: String,
}

impl StartingEntry {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl EntryModule for StartingEntry {
    fn render_document(&self, doc: DocumentContext<'_>) -> anyhow::Result<Response> {
        let page = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{name}</title>\n</head>\n<body>\n<h1>{name} is starting...</h1>\n{body}\n\
             </body>\n</html>\n",
            name = self.app_name,
            body = doc.compose(),
        );
        Ok(Response::html(StatusCode::OK, page))
    }
}

/// Host-provided modules, addressed from the bundle as `native:<name>`.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    routes: HashMap<String, Arc<dyn RouteModule>>,
    entries: HashMap<String, Arc<dyn EntryModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, name: impl Into<String>, module: Arc<dyn RouteModule>) -> Self {
        self.routes.insert(name.into(), module);
        self
    }

    pub fn with_route_fn<F>(self, name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
    {
        self.with_route(name, Arc::new(FnModule(render)))
    }

    pub fn with_entry(mut self, name: impl Into<String>, module: Arc<dyn EntryModule>) -> Self {
        self.entries.insert(name.into(), module);
        self
    }

    pub fn route(&self, name: &str) -> Option<Arc<dyn RouteModule>> {
        self.routes.get(name).cloned()
    }

    pub fn entry(&self, name: &str) -> Option<Arc<dyn EntryModule>> {
        self.entries.get(name).cloned()
    }
}
