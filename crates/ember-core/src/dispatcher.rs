//! Per-request dispatch state machine

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use ember_assets::AssetServer;
use ember_bundle::{Mode, RenderError, SsrInvoker};
use ember_protocol::{header, HeaderValue, Request, Response, Upstream};
use ember_session::{CookieBridge, SessionError};

use crate::config::APP_NAME;
use crate::diagnostics;

/// Terminal state a request ended in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Forwarded to the dev server in development mode
    DevForward,
    /// Forwarded to another local service on a different port
    Passthrough,
    AssetHit,
    SsrRender,
    ErrorResponse,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::DevForward => "dev_forward",
            DispatchState::Passthrough => "passthrough",
            DispatchState::AssetHit => "asset_hit",
            DispatchState::SsrRender => "ssr_render",
            DispatchState::ErrorResponse => "error_response",
        }
    }
}

#[derive(Debug)]
pub struct Dispatched {
    pub state: DispatchState,
    pub response: Response,
}

/// Anything that turns a request into the diagnostic 500
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Cookie bridge failed: {0}")]
    Session(#[from] SessionError),

    #[error("Request handling panicked: {0}")]
    Panicked(String),
}

/// The only component that talks to the protocol interception point.
pub struct RequestDispatcher {
    mode: Mode,
    port: u16,
    assets: AssetServer,
    cookies: CookieBridge,
    invoker: SsrInvoker,
    passthrough: Arc<dyn Upstream>,
    dev: Option<Arc<dyn Upstream>>,
    dev_port: Option<u16>,
}

impl RequestDispatcher {
    pub fn new(
        mode: Mode,
        port: u16,
        assets: AssetServer,
        cookies: CookieBridge,
        invoker: SsrInvoker,
        passthrough: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            mode,
            port,
            assets,
            cookies,
            invoker,
            passthrough,
            dev: None,
            dev_port: None,
        }
    }

    /// Route development-mode traffic for the app to the dev server at
    /// `origin`. Without one, dev requests go to their own URL.
    pub fn with_dev_upstream(mut self, upstream: Arc<dyn Upstream>, origin: &Url) -> Self {
        self.dev = Some(upstream);
        self.dev_port = origin.port_or_known_default();
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Handle one request. Never fails: every error, including a panic in
    /// any stage, comes back as a diagnostic response.
    pub async fn dispatch(&self, request: Request) -> Response {
        self.dispatch_traced(request).await.response
    }

    pub async fn dispatch_traced(&self, request: Request) -> Dispatched {
        let request_id = Uuid::new_v4();
        let url = request.url.to_string();
        let span = tracing::info_span!(
            "dispatch",
            %request_id,
            method = %request.method,
            url = %url
        );

        let outcome = AssertUnwindSafe(self.route(request))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        span.in_scope(|| {
            let dispatched = match outcome {
                Ok(Ok(dispatched)) => dispatched,
                Ok(Err(err)) => self.error_response(&url, &err),
                Err(panic) => {
                    let err = DispatchError::Panicked(panic_message(panic));
                    self.error_response(&url, &err)
                }
            };

            tracing::debug!(
                state = dispatched.state.as_str(),
                status = dispatched.response.status.as_u16(),
                "Request dispatched"
            );
            dispatched
        })
    }

    async fn route(&self, mut request: Request) -> Result<Dispatched, DispatchError> {
        if !request.headers.contains_key(header::REFERER) {
            if let Some(referrer) = request.referrer.as_deref() {
                if let Ok(value) = HeaderValue::from_str(referrer) {
                    request.headers.insert(header::REFERER, value);
                }
            }
        }

        // Other local services keep going to their own URL in every mode
        if self.mode.is_development() && self.is_renderer_port(request.port()) {
            let upstream = self.dev.as_ref().unwrap_or(&self.passthrough);
            return Ok(self.forward(upstream, request, DispatchState::DevForward).await);
        }

        if request.port() != Some(self.port) {
            tracing::debug!(port = ?request.port(), "Forwarding request to local service");
            return Ok(self
                .forward(&self.passthrough, request, DispatchState::Passthrough)
                .await);
        }

        if let Some(response) = self
            .assets
            .serve(&request.method, request.url.path())
            .await
        {
            return Ok(Dispatched {
                state: DispatchState::AssetHit,
                response,
            });
        }

        let cookies = self.cookies.attach_outbound(&mut request).await?;
        tracing::trace!(cookies, "Attached outbound cookies");

        let response = self.invoker.render(request).await?;
        self.cookies.persist_inbound(&response.headers).await?;

        Ok(Dispatched {
            state: DispatchState::SsrRender,
            response,
        })
    }

    fn is_renderer_port(&self, port: Option<u16>) -> bool {
        port.is_some() && (port == Some(self.port) || port == self.dev_port)
    }

    async fn forward(
        &self,
        upstream: &Arc<dyn Upstream>,
        request: Request,
        state: DispatchState,
    ) -> Dispatched {
        let target = request.url.to_string();
        let response = match upstream.forward(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(target_url = %target, error = %err, "Forward failed");
                diagnostics::upstream_failure(&target, &err)
            }
        };
        Dispatched { state, response }
    }

    fn error_response(&self, url: &str, err: &DispatchError) -> Dispatched {
        let response = match err {
            DispatchError::Render(render) => {
                tracing::error!(
                    message = %render.message(),
                    stack = %render.stack(),
                    "Error in SSR handler"
                );
                diagnostics::render_error_page(APP_NAME, render)
            }
            other => {
                tracing::error!(error = %diagnostics::error_chain(other), "Error handling request");
                diagnostics::request_error(url, other)
            }
        };

        Dispatched {
            state: DispatchState::ErrorResponse,
            response,
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
