//! Forwarding seam between the dispatcher and remote HTTP services

use async_trait::async_trait;

use crate::error::ForwardError;
use crate::message::{Request, Response};

/// Something that can take an intercepted request and produce the response
/// of a real HTTP service (the dev server, or any other local service).
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(&self, request: Request) -> Result<Response, ForwardError>;
}
