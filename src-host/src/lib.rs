//! Ember - Desktop shell host
//!
//! Binds the production port and hands every request the embedded browser
//! surface makes to the core dispatcher.

mod interception;

use anyhow::Context;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

use ember_core::{Config, MemoryCookieStore, ModuleRegistry, RequestDispatcher, Shell};

pub async fn run() -> anyhow::Result<()> {
    // Initialize logging
    ember_core::init_logging();
    install_panic_hook();

    let config = Config::from_env().context("Invalid configuration")?;
    let port = config.port;

    let shell = Shell::start(config, ModuleRegistry::new(), Arc::new(MemoryCookieStore::new()))
        .await
        .context("Failed to start shell")?;

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind 127.0.0.1:{}", port))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        renderer = %shell.renderer_url(),
        "Ember started"
    );

    axum::serve(listener, router(shell.dispatcher()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shell.shutdown().await?;
    Ok(())
}

/// Every path goes to the dispatcher
pub fn router(dispatcher: Arc<RequestDispatcher>) -> Router {
    Router::new().fallback(intercept).with_state(dispatcher)
}

async fn intercept(
    State(dispatcher): State<Arc<RequestDispatcher>>,
    request: axum::extract::Request,
) -> axum::response::Response {
    match interception::to_ember_request(request, dispatcher.port()) {
        Ok(request) => interception::to_axum_response(dispatcher.dispatch(request).await),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected request with unusable target");
            (axum::http::StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// Last resort: a panic that escapes the dispatcher is logged, and the
/// server keeps running.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("Unhandled panic: {}", info);
    }));
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    async fn serve_shell(dir: &TempDir) -> (u16, Shell) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let app_path = dir.path().join("app");
        fs::create_dir_all(app_path.join("build/client")).unwrap();
        fs::write(app_path.join("build/client/app.js"), "export {}").unwrap();
        let mut config = Config::new(app_path, dir.path().join("data"));
        config.port = port;

        let shell = Shell::start(config, ModuleRegistry::new(), Arc::new(MemoryCookieStore::new()))
            .await
            .unwrap();
        let app = router(shell.dispatcher());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (port, shell)
    }

    #[tokio::test]
    async fn test_serves_fallback_page_and_assets() {
        let dir = TempDir::new().unwrap();
        let (port, _shell) = serve_shell(&dir).await;
        let client = reqwest::Client::new();

        let page = client
            .get(format!("http://127.0.0.1:{}/", port))
            .send()
            .await
            .unwrap();
        assert_eq!(page.status(), 200);
        assert!(page.text().await.unwrap().contains("is starting..."));

        let asset = client
            .get(format!("http://127.0.0.1:{}/app.js", port))
            .send()
            .await
            .unwrap();
        assert_eq!(asset.status(), 200);
        assert!(asset
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("javascript"));
        assert_eq!(asset.text().await.unwrap(), "export {}");
    }
}
