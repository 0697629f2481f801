//! reqwest-backed forwarding to local HTTP services

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::redirect::Policy;
use reqwest::Client;
use url::Url;

use ember_protocol::{header, Body, ForwardError, Request, Response, Upstream};

use crate::Result;

/// Forwards intercepted requests over real HTTP.
///
/// A passthrough upstream sends each request to its own URL. A rebased one
/// keeps path and query but swaps the origin, which is how requests reach
/// the dev server.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    base: Option<Url>,
}

impl HttpUpstream {
    pub fn passthrough() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base: None,
        })
    }

    pub fn rebased(base: Url) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base: Some(base),
        })
    }

    fn target(&self, url: &Url) -> Url {
        match &self.base {
            None => url.clone(),
            Some(base) => {
                let mut target = base.clone();
                target.set_path(url.path());
                target.set_query(url.query());
                target
            }
        }
    }
}

fn build_client() -> Result<Client> {
    // Redirects go back to the browser surface untouched
    Ok(Client::builder().redirect(Policy::none()).build()?)
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, request: Request) -> std::result::Result<Response, ForwardError> {
        let Request {
            method,
            url,
            headers,
            body,
            ..
        } = request;
        let target = self.target(&url);
        let body = body.collect().await?;

        let mut builder = self.client.request(method.clone(), target.clone());
        for (name, value) in headers.iter() {
            if name == header::HOST || name == header::CONTENT_LENGTH {
                continue;
            }
            builder = builder.header(name, value);
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        tracing::debug!(method = %method, target = %target, "Forwarding request");

        let upstream = builder.send().await.map_err(|e| {
            if e.is_builder() {
                ForwardError::InvalidRequest(e.to_string())
            } else {
                ForwardError::Unavailable {
                    url: target.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let mut response = Response::new(upstream.status(), Body::empty());
        for (name, value) in upstream.headers() {
            if name == header::CONNECTION {
                continue;
            }
            response.headers.append(name.clone(), value.clone());
        }
        response.body = Body::from_stream(upstream.bytes_stream().map_err(std::io::Error::other));

        Ok(response)
    }
}
