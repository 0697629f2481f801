//! SSR invocation

use anyhow::Context;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use ember_protocol::{HeaderMap, Method, Request, Response, StatusCode, Url};

use crate::error::RenderError;
use crate::matcher::match_path;
use crate::model::Bundle;
use crate::module::{DocumentContext, RenderContext, RenderedRoute};

/// Environment-specific values the host injects into every render.
/// Modules must cope with it being empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadContext(Map<String, Value>);

impl LoadContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Handler built once from the bundle's entry and route tree
struct RequestHandler {
    bundle: Arc<Bundle>,
    context: LoadContext,
}

impl RequestHandler {
    fn handle(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &[u8],
    ) -> anyhow::Result<Response> {
        let tree = self.bundle.routes();
        let (status, chain, params) = match match_path(tree, url.path()) {
            Some(matched) => (StatusCode::OK, matched.chain, matched.params),
            None => (StatusCode::NOT_FOUND, vec![tree.root()], BTreeMap::new()),
        };

        let mut rendered = Vec::with_capacity(chain.len() + 1);
        for node in chain {
            let ctx = RenderContext {
                route_id: &node.id,
                method,
                url,
                headers,
                params: &params,
                body,
                load_context: &self.context,
            };
            let markup = node
                .module
                .module()
                .render(&ctx)
                .with_context(|| format!("route module '{}' failed", node.id))?;
            rendered.push(RenderedRoute {
                id: node.id.clone(),
                markup,
            });
        }

        if status == StatusCode::NOT_FOUND {
            rendered.push(RenderedRoute {
                id: "not-found".to_string(),
                markup: Some("<h1>404 Not Found</h1>".to_string()),
            });
        }

        let doc = DocumentContext {
            status,
            url,
            chain: rendered,
            assets: self.bundle.assets(),
            public_path: self.bundle.public_path(),
            load_context: &self.context,
        };
        self.bundle
            .entry()
            .module()
            .render_document(doc)
            .with_context(|| format!("entry module '{}' failed", self.bundle.entry().specifier()))
    }
}

/// Renders requests through the process-lifetime bundle.
#[derive(Clone)]
pub struct SsrInvoker {
    handler: Arc<RequestHandler>,
}

impl SsrInvoker {
    pub fn new(bundle: Arc<Bundle>, context: LoadContext) -> Self {
        tracing::debug!(
            entry = %bundle.entry().specifier(),
            routes = bundle.routes().len(),
            context_keys = context.0.len(),
            "Built SSR request handler"
        );

        Self {
            handler: Arc::new(RequestHandler { bundle, context }),
        }
    }

    pub fn bundle(&self) -> &Bundle {
        &self.handler.bundle
    }

    /// Render `request`. Module failures and panics come back as
    /// [`RenderError`]; nothing escapes past this call.
    pub async fn render(&self, request: Request) -> Result<Response, RenderError> {
        let Request {
            method,
            url,
            headers,
            body,
            ..
        } = request;
        let target = url.to_string();

        let body = body.collect().await.map_err(|source| RenderError::Body {
            url: target.clone(),
            source,
        })?;

        let handler = Arc::clone(&self.handler);
        let task =
            tokio::task::spawn_blocking(move || handler.handle(&method, &url, &headers, &body));

        match task.await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(cause)) => Err(RenderError::Module { url: target, cause }),
            Err(join) if join.is_panic() => Err(RenderError::Panicked {
                url: target,
                message: panic_message(join.into_panic()),
            }),
            Err(_) => Err(RenderError::Cancelled { url: target }),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
