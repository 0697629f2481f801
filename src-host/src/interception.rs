//! Conversion between the HTTP server's messages and the dispatcher's

use futures_util::TryStreamExt;
use std::io;

use axum::http::{header, HeaderMap};
use ember_core::{Body, Request, Response};
use url::Url;

/// Build the dispatcher's request. Proxy-style absolute-form targets are
/// used as-is; origin-form targets are completed from the `Host` header.
pub(crate) fn to_ember_request(
    request: axum::extract::Request,
    port: u16,
) -> Result<Request, url::ParseError> {
    let (parts, body) = request.into_parts();

    let url = if parts.uri.scheme().is_some() {
        Url::parse(&parts.uri.to_string())?
    } else {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format!("localhost:{}", port));
        let target = parts
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        Url::parse(&format!("http://{}{}", host, target))?
    };

    let mut converted = Request::new(parts.method, url);
    converted.referrer = browser_referrer(&parts.headers);
    converted.headers = parts.headers;
    converted.body = Body::from_stream(body.into_data_stream().map_err(io::Error::other));
    Ok(converted)
}

/// What the browser reports as the referring page. `Origin` stands in
/// when a referrer policy stripped `Referer`.
fn browser_referrer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::REFERER)
        .or_else(|| headers.get(header::ORIGIN))
        .and_then(|v| v.to_str().ok())
        .filter(|v| *v != "null")
        .map(str::to_string)
}

pub(crate) fn to_axum_response(response: Response) -> axum::response::Response {
    let Response {
        status,
        headers,
        body,
    } = response;

    let body = match body {
        Body::Empty => axum::body::Body::empty(),
        Body::Full(bytes) => axum::body::Body::from(bytes),
        Body::Stream(stream) => axum::body::Body::from_stream(stream),
    };

    let mut converted = axum::response::Response::new(body);
    *converted.status_mut() = status;
    *converted.headers_mut() = headers;
    converted
}
