//! Sandboxed static file responder

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use ember_protocol::{header, Body, HeaderValue, Method, Response, StatusCode};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::error::AssetError;
use crate::Result;

/// Serves regular files under a fixed root directory.
///
/// Requests that would leave the root are rejected before any filesystem
/// access and look exactly like a missing file to the caller.
#[derive(Debug, Clone)]
pub struct AssetServer {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
}

impl AssetServer {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(AssetError::NotAbsolute(root));
        }

        let root = normalize(&root);
        let canonical_root = std::fs::canonicalize(&root).ok();
        if canonical_root.is_none() {
            tracing::warn!(root = %root.display(), "Asset root does not exist yet");
        }

        Ok(Self {
            root,
            canonical_root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto the sandbox without touching the filesystem.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = match urlencoding::decode(request_path) {
            Ok(decoded) => decoded,
            Err(_) => {
                tracing::trace!(path = request_path, "Asset path is not valid UTF-8");
                return None;
            }
        };
        if decoded.contains('\0') {
            tracing::trace!(path = request_path, "Asset path contains NUL");
            return None;
        }

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(decoded.as_ref()).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        tracing::trace!(path = request_path, "Asset path escapes sandbox");
                        return None;
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::Prefix(_) => {
                    tracing::trace!(path = request_path, "Asset path carries a drive prefix");
                    return None;
                }
            }
        }

        // The root itself is a directory, never an asset
        if depth == 0 || !resolved.starts_with(&self.root) {
            return None;
        }
        Some(resolved)
    }

    /// Serve `request_path` if it names a regular file inside the sandbox.
    /// `None` means the caller should move on to the next stage.
    pub async fn serve(&self, method: &Method, request_path: &str) -> Option<Response> {
        let resolved = self.resolve(request_path)?;

        let metadata = match tokio::fs::metadata(&resolved).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::trace!(path = %resolved.display(), error = %e, "Asset miss");
                return None;
            }
        };
        if !metadata.is_file() {
            tracing::trace!(path = %resolved.display(), "Asset path is not a regular file");
            return None;
        }

        // Symlinks may still point outside the sandbox
        let canonical = tokio::fs::canonicalize(&resolved).await.ok()?;
        let root = match &self.canonical_root {
            Some(root) => Cow::Borrowed(root),
            None => Cow::Owned(tokio::fs::canonicalize(&self.root).await.ok()?),
        };
        if !canonical.starts_with(&*root) {
            tracing::trace!(path = %resolved.display(), "Asset resolves outside sandbox");
            return None;
        }

        let body = if method == Method::HEAD {
            Body::empty()
        } else {
            match File::open(&canonical).await {
                Ok(file) => Body::from_stream(ReaderStream::new(file)),
                Err(e) => {
                    tracing::debug!(path = %canonical.display(), error = %e, "Failed to open asset");
                    return None;
                }
            }
        };

        let mut response = Response::new(StatusCode::OK, body)
            .with_header(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
        if let Some(mime) = mime_guess::from_path(&resolved).first() {
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                response.headers.insert(header::CONTENT_TYPE, value);
            }
        }

        tracing::debug!(
            path = %resolved.display(),
            bytes = metadata.len(),
            content_type = response.content_type().unwrap_or("-"),
            "Serving asset"
        );
        Some(response)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, AssetServer) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("client");
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("assets/app.css"), "body { margin: 0 }").unwrap();
        fs::write(root.join("assets/entry.js"), "console.log('hi')").unwrap();
        fs::write(root.join("favicon.ico"), [0u8, 0, 1, 0]).unwrap();
        fs::write(dir.path().join("secret.txt"), "top secret").unwrap();

        let server = AssetServer::new(&root).unwrap();
        (dir, server)
    }

    #[test]
    fn test_relative_root_rejected() {
        let err = AssetServer::new("build/client").unwrap_err();
        assert!(matches!(err, AssetError::NotAbsolute(_)));
    }

    #[test]
    fn test_root_is_normalized() {
        let (dir, _) = sandbox();
        let server = AssetServer::new(dir.path().join("client/./assets/..")).unwrap();
        assert_eq!(server.root(), dir.path().join("client"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let (_dir, server) = sandbox();
        for path in [
            "/../secret.txt",
            "/%2e%2e/secret.txt",
            "/%2E%2E/secret.txt",
            "/assets/..%2f..%2fsecret.txt",
            "/assets/../../secret.txt",
            "/assets/%2e%2e/%2e%2e/secret.txt",
            "/file%00.js",
            "/",
            "",
        ] {
            assert_eq!(server.resolve(path), None, "path {path:?} should be rejected");
        }
    }

    #[test]
    fn test_resolve_stays_inside_root() {
        let (_dir, server) = sandbox();
        assert_eq!(
            server.resolve("/assets/../favicon.ico"),
            Some(server.root().join("favicon.ico"))
        );
        assert_eq!(
            server.resolve("/assets/app%20name.js"),
            Some(server.root().join("assets/app name.js"))
        );
    }

    #[tokio::test]
    async fn test_traversal_to_existing_file_is_miss() {
        let (_dir, server) = sandbox();
        assert!(server.serve(&Method::GET, "/../secret.txt").await.is_none());
        assert!(server.serve(&Method::GET, "/%2e%2e/secret.txt").await.is_none());
    }

    #[tokio::test]
    async fn test_serves_with_content_type() {
        let (_dir, server) = sandbox();

        let css = server.serve(&Method::GET, "/assets/app.css").await.unwrap();
        assert_eq!(css.status, StatusCode::OK);
        assert_eq!(css.content_type(), Some("text/css"));
        assert_eq!(css.headers.get(header::CONTENT_LENGTH).unwrap(), "18");
        assert!(css.body.is_stream());
        assert_eq!(css.body.collect_string().await.unwrap(), "body { margin: 0 }");

        let js = server.serve(&Method::GET, "/assets/entry.js").await.unwrap();
        assert!(js.content_type().unwrap().contains("javascript"));
    }

    #[tokio::test]
    async fn test_head_has_headers_only() {
        let (_dir, server) = sandbox();
        let response = server.serve(&Method::HEAD, "/assets/app.css").await.unwrap();
        assert_eq!(response.headers.get(header::CONTENT_LENGTH).unwrap(), "18");
        assert_eq!(response.body.known_len(), Some(0));
    }

    #[tokio::test]
    async fn test_directory_and_missing_are_misses() {
        let (_dir, server) = sandbox();
        assert!(server.serve(&Method::GET, "/assets").await.is_none());
        assert!(server.serve(&Method::GET, "/assets/").await.is_none());
        assert!(server.serve(&Method::GET, "/missing.js").await.is_none());
        assert!(server.serve(&Method::GET, "/chat/123").await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_miss() {
        let (dir, server) = sandbox();
        std::os::unix::fs::symlink(dir.path().join("secret.txt"), server.root().join("leak.txt"))
            .unwrap();
        assert!(server.serve(&Method::GET, "/leak.txt").await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_inside_root_is_served() {
        let (_dir, server) = sandbox();
        std::os::unix::fs::symlink(
            server.root().join("assets/app.css"),
            server.root().join("styles.css"),
        )
        .unwrap();
        let response = server.serve(&Method::GET, "/styles.css").await.unwrap();
        assert_eq!(response.content_type(), Some("text/css"));
    }
}
