//! Ember Protocol
//!
//! Plain HTTP request/response representations exchanged between the host's
//! protocol interception point and the dispatcher. Bodies are streams so that
//! large assets and proxied responses never have to be buffered.

mod body;
mod error;
mod message;
mod upstream;

pub use body::Body;
pub use error::ForwardError;
pub use message::{Request, Response};
pub use upstream::Upstream;

pub use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
pub use url::Url;
