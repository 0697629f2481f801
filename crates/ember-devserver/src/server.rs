//! Development server process lifecycle

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::config::DevServerConfig;
use crate::error::DevServerError;
use crate::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

struct Running {
    /// `None` when an already-listening server was adopted
    child: Option<Child>,
    url: Url,
}

/// Locally spawned development server, owned by whoever started it.
///
/// The child is killed on [`DevServer::stop`] and when the handle is dropped.
pub struct DevServer {
    config: DevServerConfig,
    state: Mutex<Option<Running>>,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DevServerConfig {
        &self.config
    }

    /// Start the server and wait until it accepts connections.
    /// Calling it again returns the URL of the running instance.
    pub async fn start(&self) -> Result<Url> {
        let mut state = self.state.lock().await;
        if let Some(running) = state.as_ref() {
            return Ok(running.url.clone());
        }

        let url = self.config.url()?;
        let addr = self.config.addr();

        if is_listening(&addr).await {
            tracing::info!(url = %url, "Adopting dev server already listening");
            *state = Some(Running {
                child: None,
                url: url.clone(),
            });
            return Ok(url);
        }

        tracing::info!(
            program = %self.config.program,
            args = ?self.config.args,
            port = self.config.port,
            "Spawning dev server"
        );

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .env("PORT", self.config.port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| DevServerError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(log_output(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_output(stderr, "stderr"));
        }

        // On failure the child is dropped here and killed with it
        self.await_ready(&mut child, &addr).await?;

        tracing::info!(url = %url, pid = ?child.id(), "Dev server ready");
        *state = Some(Running {
            child: Some(child),
            url: url.clone(),
        });
        Ok(url)
    }

    async fn await_ready(&self, child: &mut Child, addr: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.ready_timeout;
        loop {
            if is_listening(addr).await {
                return Ok(());
            }
            if let Some(status) = child.try_wait()? {
                return Err(DevServerError::Bind {
                    addr: addr.to_string(),
                    reason: format!("process exited with {}", status),
                });
            }
            if Instant::now() >= deadline {
                return Err(DevServerError::Timeout {
                    addr: addr.to_string(),
                    timeout: self.config.ready_timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// URL of the running server, if started
    pub async fn url(&self) -> Option<Url> {
        self.state.lock().await.as_ref().map(|running| running.url.clone())
    }

    pub async fn stop(&self) -> Result<()> {
        let running = self.state.lock().await.take();
        if let Some(Running {
            child: Some(mut child),
            url,
        }) = running
        {
            child.kill().await?;
            tracing::info!(url = %url, "Dev server stopped");
        }
        Ok(())
    }
}

async fn is_listening(addr: &str) -> bool {
    matches!(
        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

async fn log_output<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::info!(target: "devserver", stream, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_start_adopts_listening_server_and_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = DevServer::new(
            DevServerConfig::new("ember-no-such-dev-command", Vec::<String>::new()).with_port(port),
        );

        let first = server.start().await.unwrap();
        let second = server.start().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.port(), Some(port));
        assert_eq!(server.url().await, Some(first));

        server.stop().await.unwrap();
        assert_eq!(server.url().await, None);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let port = unused_port().await;
        let server = DevServer::new(
            DevServerConfig::new("ember-no-such-dev-command", Vec::<String>::new()).with_port(port),
        );

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, DevServerError::Spawn { .. }));
        assert_eq!(server.url().await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_without_binding_is_fatal() {
        let port = unused_port().await;
        let server =
            DevServer::new(DevServerConfig::new("sh", ["-c", "exit 3"]).with_port(port));

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, DevServerError::Bind { .. }), "got {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ready_timeout() {
        let port = unused_port().await;
        let server = DevServer::new(
            DevServerConfig::new("sleep", ["5"])
                .with_port(port)
                .with_ready_timeout(Duration::from_millis(300)),
        );

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, DevServerError::Timeout { .. }), "got {err}");
    }
}
