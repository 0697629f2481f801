//! Shell startup and shutdown

use std::sync::Arc;

use ember_assets::AssetServer;
use ember_bundle::{BundleLoader, BundleSource, ModuleRegistry, SsrInvoker};
use ember_devserver::{DevServer, HttpUpstream};
use ember_session::{CookieBridge, CookieStore, SqliteCookieStore};
use ember_storage::Database;
use url::Url;

use crate::config::Config;
use crate::dispatcher::RequestDispatcher;
use crate::Result;

/// Everything the host needs once startup has finished.
///
/// The bundle is fully loaded before the dispatcher exists, so no request
/// can observe a partially loaded bundle.
pub struct Shell {
    config: Config,
    dispatcher: Arc<RequestDispatcher>,
    dev_server: Option<DevServer>,
    renderer_url: Url,
}

impl Shell {
    /// Start the shell. `jar` is the embedded browser session's cookie jar.
    pub async fn start(
        config: Config,
        registry: ModuleRegistry,
        jar: Arc<dyn CookieStore>,
    ) -> Result<Self> {
        tracing::info!(
            mode = config.mode.as_str(),
            app_path = %config.app_path.display(),
            data_dir = %config.data_dir.display(),
            "Starting shell"
        );

        let db = Database::open(&config.database_path)?;
        let cookies = CookieBridge::new(jar, Arc::new(SqliteCookieStore::new(db)));
        cookies.restore().await?;

        let source = BundleSource::new(config.server_bundle_path(), config.mode);
        let bundle = BundleLoader::new(source, registry).load().await;
        let invoker = SsrInvoker::new(Arc::new(bundle), config.load_context());

        let assets = AssetServer::new(config.client_dir())?;
        let passthrough = Arc::new(HttpUpstream::passthrough()?);
        let mut dispatcher =
            RequestDispatcher::new(config.mode, config.port, assets, cookies, invoker, passthrough);

        let (dev_server, renderer_url) = if config.mode.is_development() {
            let server = DevServer::new(config.dev_server_config()?);
            let url = server.start().await?;
            let upstream = Arc::new(HttpUpstream::rebased(url.clone())?);
            dispatcher = dispatcher.with_dev_upstream(upstream, &url);
            (Some(server), url)
        } else {
            (None, config.renderer_url()?)
        };

        tracing::info!(url = %renderer_url, "Using renderer URL");

        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
            dev_server,
            renderer_url,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> Arc<RequestDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// URL the embedded browser surface should load
    pub fn renderer_url(&self) -> &Url {
        &self.renderer_url
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(server) = &self.dev_server {
            server.stop().await?;
        }
        tracing::info!("Shell stopped");
        Ok(())
    }
}
