//! WebDriver endpoint management - spawning and readiness checking a local driver

use serde::Deserialize;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use pagewalk_common::{BrowserConfig, BrowserKind};

use crate::error::{E2eError, E2eResult};

/// How long a driver gets to exit after SIGTERM before it is killed
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Handle to a running driver process (chromedriver, geckodriver).
///
/// Dropping the handle kills the process; [`DriverHandle::stop`] lets it
/// shut down cleanly first.
pub struct DriverHandle {
    child: Child,
    pub url: String,
    pub port: u16,
}

/// Configuration for spawning a driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub binary_path: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    pub startup_timeout: Duration,

    /// Extra arguments passed verbatim
    pub args: Vec<String>,
}

impl DriverConfig {
    /// Driver for the configured browser; the binary defaults to the
    /// browser's usual driver on `PATH`
    pub fn for_browser(browser: &BrowserConfig) -> Self {
        let binary_path = browser.driver_binary.clone().unwrap_or_else(|| {
            PathBuf::from(match browser.kind {
                BrowserKind::Chrome => "chromedriver",
                BrowserKind::Firefox => "geckodriver",
            })
        });
        Self {
            binary_path,
            ..Self::default()
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("chromedriver"),
            port: None,
            startup_timeout: Duration::from_secs(30),
            args: Vec::new(),
        }
    }
}

/// Body of the W3C `/status` endpoint
#[derive(Debug, Deserialize)]
struct StatusResponse {
    value: StatusValue,
}

#[derive(Debug, Deserialize)]
struct StatusValue {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    message: String,
}

impl DriverHandle {
    /// Spawn a driver and wait until it reports ready
    pub async fn spawn(config: DriverConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary_path.display(), port);

        let mut cmd = Command::new(&config.binary_path);
        cmd.arg(format!("--port={}", port))
            .args(&config.args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::DriverStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        // a full pipe would block the driver mid-write
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "pagewalk::driver", "{}", line);
                }
            });
        }

        let handle = DriverHandle { child, url, port };
        wait_until_ready(&handle.url, config.startup_timeout).await?;

        info!("Driver is ready at {}", handle.url);
        Ok(handle)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the driver: SIGTERM, then kill once the grace period is over
    pub async fn stop(&mut self) -> E2eResult<()> {
        let Some(id) = self.child.id() else {
            // already reaped
            return Ok(());
        };
        info!("Stopping driver (pid: {})", id);

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(id as i32), Signal::SIGTERM).is_ok() {
                if let Ok(status) = timeout(STOP_GRACE, self.child.wait()).await {
                    debug!("Driver exited: {:?}", status?);
                    return Ok(());
                }
                warn!("Driver ignored SIGTERM, killing it");
            }
        }

        self.child.kill().await?;
        Ok(())
    }
}

/// One readiness probe of a WebDriver endpoint
pub async fn probe_url(url: &str) -> E2eResult<bool> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    let status_url = format!("{}/status", url.trim_end_matches('/'));

    let resp = client.get(&status_url).send().await?;
    if !resp.status().is_success() {
        warn!("Readiness check returned {}", resp.status());
        return Ok(false);
    }
    let status: StatusResponse = resp.json().await?;
    if !status.value.ready {
        debug!("Driver not ready: {}", status.value.message);
    }
    Ok(status.value.ready)
}

/// Poll `url` until it reports ready or `timeout` passes
pub async fn wait_until_ready(url: &str, timeout: Duration) -> E2eResult<()> {
    let start = Instant::now();
    let mut attempts = 0;

    while start.elapsed() < timeout {
        attempts += 1;

        match probe_url(url).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(E2eError::Http(e)) => {
                if attempts == 1 {
                    info!("Waiting for driver to start...");
                }
                // connection refused is expected while the driver boots
                if !e.is_connect() {
                    warn!("Readiness check error: {}", e);
                }
            }
            Err(e) => return Err(e),
        }

        sleep(Duration::from_millis(100)).await;
    }

    Err(E2eError::DriverHealthCheck {
        url: url.to_string(),
        attempts,
    })
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewalk_common::BrowserConfig;

    #[test]
    fn test_find_free_port() {
        let port = find_free_port().unwrap();
        assert!(port > 1024);
    }

    #[test]
    fn test_driver_binary_follows_browser() {
        let mut browser = BrowserConfig::default();
        assert_eq!(DriverConfig::for_browser(&browser).binary_path, PathBuf::from("chromedriver"));

        browser.kind = BrowserKind::Firefox;
        assert_eq!(DriverConfig::for_browser(&browser).binary_path, PathBuf::from("geckodriver"));

        browser.driver_binary = Some(PathBuf::from("/opt/drivers/chromedriver-126"));
        assert_eq!(
            DriverConfig::for_browser(&browser).binary_path,
            PathBuf::from("/opt/drivers/chromedriver-126")
        );
    }

    #[test]
    fn test_status_body_parses() {
        let body = r#"{"value":{"ready":true,"message":"ChromeDriver ready for new sessions."}}"#;
        let status: StatusResponse = serde_json::from_str(body).unwrap();
        assert!(status.value.ready);
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let config = DriverConfig {
            binary_path: PathBuf::from("/nonexistent/pagewalk-driver"),
            startup_timeout: Duration::from_millis(200),
            ..DriverConfig::default()
        };
        let err = DriverHandle::spawn(config).await.err().unwrap();
        assert!(matches!(err, E2eError::DriverStartup(_)));
    }

    /// Answers every request with a ready `/status` body
    async fn serve_ready_status(listener: tokio::net::TcpListener) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let body = r#"{"value":{"ready":true,"message":"ready"}}"#;
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    }

    /// A driver that logs more than a pipe buffer holds keeps running
    #[cfg(unix)]
    #[tokio::test]
    async fn test_chatty_driver_is_not_blocked_on_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("past-the-logs");
        let script = dir.path().join("fake-driver");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nhead -c 262144 /dev/zero | tr '\\0' 'x' >&2\ntouch {}\nexec sleep 30\n",
                marker.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_ready_status(listener));

        let mut driver = DriverHandle::spawn(DriverConfig {
            binary_path: script,
            port: Some(port),
            startup_timeout: Duration::from_secs(5),
            args: Vec::new(),
        })
        .await
        .unwrap();

        let start = Instant::now();
        while !marker.exists() && start.elapsed() < Duration::from_secs(5) {
            sleep(Duration::from_millis(50)).await;
        }
        assert!(marker.exists(), "driver stalled writing to stderr");

        let stopping = Instant::now();
        driver.stop().await.unwrap();
        assert!(stopping.elapsed() < STOP_GRACE + Duration::from_secs(1));
        assert!(driver.child.try_wait().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_times_out() {
        let port = find_free_port().unwrap();
        let err = wait_until_ready(&format!("http://127.0.0.1:{}", port), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::DriverHealthCheck { .. }));
    }
}
