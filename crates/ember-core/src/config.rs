//! Shell configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use ember_bundle::{LoadContext, Mode};
use ember_devserver::{DevServerConfig, DEFAULT_DEV_PORT};
use url::Url;

use crate::error::CoreError;
use crate::Result;

/// Port the production renderer URL points at. Requests to any other port
/// belong to some other local service.
pub const DEFAULT_PORT: u16 = 5173;

pub const APP_NAME: &str = "Ember";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mode: Mode,
    /// Packaged application root, containing `build/`
    pub app_path: PathBuf,
    /// Per-user data directory
    pub data_dir: PathBuf,
    /// Path to the database file
    pub database_path: PathBuf,
    /// Production port owned by the dispatcher
    pub port: u16,
    /// Command that runs the dev server, e.g. `npm run dev`
    pub dev_command: String,
    pub dev_port: u16,
}

impl Config {
    pub fn new(app_path: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            mode: Mode::Production,
            app_path,
            database_path: data_dir.join("ember.db"),
            data_dir,
            port: DEFAULT_PORT,
            dev_command: "npm run dev".to_string(),
            dev_port: DEFAULT_DEV_PORT,
        }
    }

    /// Build the configuration from the process environment:
    /// `EMBER_ENV` (or `NODE_ENV`), `APP_PATH_ROOT`, `EMBER_APP_PATH`,
    /// `EMBER_PORT`, `EMBER_DEV_COMMAND` and `EMBER_DEV_PORT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cwd = std::env::current_dir()?;

        let app_path = lookup("EMBER_APP_PATH")
            .map(|p| absolutize(&cwd, Path::new(&p)))
            .unwrap_or_else(|| cwd.clone());

        let data_dir = match lookup("APP_PATH_ROOT") {
            Some(root) => {
                let root = PathBuf::from(root);
                if !root.is_absolute() {
                    return Err(CoreError::Config(format!(
                        "APP_PATH_ROOT must be an absolute path: {}",
                        root.display()
                    )));
                }
                tracing::info!(root = %root.display(), "Using APP_PATH_ROOT");
                root.join(APP_NAME.to_lowercase())
            }
            None => Self::data_dir(),
        };

        let mut config = Self::new(app_path, data_dir);

        if let Some(mode) = lookup("EMBER_ENV").or_else(|| lookup("NODE_ENV")) {
            config.mode = mode.parse().map_err(CoreError::Config)?;
        }
        if let Some(port) = lookup("EMBER_PORT") {
            config.port = parse_port("EMBER_PORT", &port)?;
        }
        if let Some(command) = lookup("EMBER_DEV_COMMAND") {
            config.dev_command = command;
        }
        if let Some(port) = lookup("EMBER_DEV_PORT") {
            config.dev_port = parse_port("EMBER_DEV_PORT", &port)?;
        }

        Ok(config)
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from(".ember"))
    }

    /// Packaged client build served by the asset server
    pub fn client_dir(&self) -> PathBuf {
        self.app_path.join("build").join("client")
    }

    /// Server bundle artifact read at startup
    pub fn server_bundle_path(&self) -> PathBuf {
        self.app_path.join("build").join("server").join("index.json")
    }

    /// URL the browser surface loads in production mode
    pub fn renderer_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!("http://localhost:{}/", self.port))?)
    }

    pub fn dev_server_config(&self) -> Result<DevServerConfig> {
        let config = DevServerConfig::from_command_line(&self.dev_command)
            .ok_or_else(|| CoreError::Config("EMBER_DEV_COMMAND is empty".to_string()))?;
        Ok(config.with_cwd(&self.app_path).with_port(self.dev_port))
    }

    /// Values injected into every render. Modules read `env` for platform
    /// bindings; it is always present, even when empty.
    pub fn load_context(&self) -> LoadContext {
        LoadContext::new()
            .with("env", Value::Object(Map::new()))
            .with("mode", Value::from(self.mode.as_str()))
    }
}

impl Default for Config {
    fn default() -> Self {
        let app_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(app_path, Self::data_dir())
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("{} is not a valid port: {}", key, value)))
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
