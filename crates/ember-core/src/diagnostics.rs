//! Diagnostic responses for failed requests

use std::error::Error;

use ember_bundle::RenderError;
use ember_protocol::{ForwardError, Response, StatusCode};

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Message followed by every source in the chain
pub(crate) fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\nCaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// HTML page for a failed render, with the cause and its stack
pub(crate) fn render_error_page(app_name: &str, error: &RenderError) -> Response {
    let app_name = escape_html(app_name);
    let page = format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{app_name} - Error</title>
    <style>
      body {{ font-family: system-ui, sans-serif; padding: 2rem; line-height: 1.5; }}
      h1 {{ color: #e53e3e; }}
      pre {{ background: #f7fafc; padding: 1rem; border-radius: 0.25rem; overflow: auto; }}
    </style>
  </head>
  <body>
    <h1>{app_name} - Application Error</h1>
    <p>There was an error processing your request. This is often caused by missing routes or server-side code issues.</p>
    <p>Error: {message}</p>
    <pre>{stack}</pre>
  </body>
</html>
"#,
        message = escape_html(&error.message()),
        stack = escape_html(&error.stack()),
    );
    Response::html(StatusCode::INTERNAL_SERVER_ERROR, page)
}

/// Plain-text 500 for failures outside rendering
pub(crate) fn request_error(url: &str, error: &dyn Error) -> Response {
    Response::text(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Error handling request to {}: {}", url, error_chain(error)),
    )
}

/// 502 for a forward that never reached its upstream
pub(crate) fn upstream_failure(url: &str, error: &ForwardError) -> Response {
    Response::text(
        StatusCode::BAD_GATEWAY,
        format!("Failed to forward request to {}: {}", url, error_chain(error)),
    )
}
