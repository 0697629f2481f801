//! Request and response messages

use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use url::Url;

use crate::body::Body;

/// An intercepted request, as handed over by the embedded browser surface.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Referrer reported by the browser surface, independent of any header
    pub referrer: Option<String>,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            referrer: None,
            body: Body::Empty,
        }
    }

    pub fn get(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Method::GET, Url::parse(url)?))
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Effective port, falling back to the scheme default
    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }

    pub fn header_str(&self, name: &header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::new(status, text.into()).with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )
    }

    pub fn html(status: StatusCode, markup: impl Into<String>) -> Self {
        Self::new(status, markup.into()).with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_port_defaults() {
        let explicit = Request::get("http://localhost:5173/app").unwrap();
        assert_eq!(explicit.port(), Some(5173));

        let implicit = Request::get("http://localhost/app").unwrap();
        assert_eq!(implicit.port(), Some(80));
    }

    #[tokio::test]
    async fn test_html_response() {
        let response = Response::html(StatusCode::OK, "<p>hi</p>");
        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(response.body.collect_string().await.unwrap(), "<p>hi</p>");
    }
}
