//! Dev server launch configuration

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const DEFAULT_DEV_PORT: u16 = 5174;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub ready_timeout: Duration,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["run".to_string(), "dev".to_string()],
            cwd: None,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_DEV_PORT,
            ready_timeout: Duration::from_secs(30),
        }
    }
}

impl DevServerConfig {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Split a whitespace-separated command line such as `pnpm run dev`.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub(crate) fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://{}:{}/", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command_line() {
        let config = DevServerConfig::from_command_line("  pnpm run dev --host ").unwrap();
        assert_eq!(config.program, "pnpm");
        assert_eq!(config.args, vec!["run", "dev", "--host"]);
        assert_eq!(config.port, DEFAULT_DEV_PORT);

        assert!(DevServerConfig::from_command_line("   ").is_none());
    }

    #[test]
    fn test_url() {
        let config = DevServerConfig::default().with_port(4000);
        assert_eq!(config.url().unwrap().as_str(), "http://127.0.0.1:4000/");
        assert_eq!(config.addr(), "127.0.0.1:4000");
    }
}
