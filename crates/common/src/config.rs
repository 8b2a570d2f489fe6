//! Suite configuration
//!
//! Everything a run needs (target address, identities, browser, timeouts) is
//! collected in one [`SuiteConfig`] that is passed explicitly to the session.
//! Values come from a TOML file and may be overridden from `PAGEWALK_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Credentials, Identity};
use crate::ENV_PREFIX;

/// Suite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Root address of the console under test
    pub base_url: String,

    /// Named accounts (`admin`, `user`, ...)
    pub identities: BTreeMap<String, Identity>,

    /// Browser / WebDriver configuration
    pub browser: BrowserConfig,

    /// Wait budgets
    pub timeouts: TimeoutConfig,

    /// Failure artifacts and results
    pub artifacts: ArtifactsConfig,

    /// Authentication helpers
    pub auth: AuthConfig,

    /// Parameters of the built-in scenarios
    pub scenarios: ScenarioConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            identities: BTreeMap::new(),
            browser: BrowserConfig::default(),
            timeouts: TimeoutConfig::default(),
            artifacts: ArtifactsConfig::default(),
            auth: AuthConfig::default(),
            scenarios: ScenarioConfig::default(),
        }
    }
}

/// Which browser the WebDriver endpoint drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Firefox => "firefox",
        }
    }
}

/// Browser / WebDriver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver, geckodriver, selenium grid)
    pub webdriver_url: String,

    pub kind: BrowserKind,

    pub headless: bool,

    pub window_width: u32,

    pub window_height: u32,

    /// Directory the browser saves downloads into
    pub download_dir: PathBuf,

    /// Driver binary to spawn locally (None = use an already running endpoint)
    pub driver_binary: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:9515".to_string(),
            kind: BrowserKind::Chrome,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            download_dir: PathBuf::from("test-results/downloads"),
            driver_binary: None,
        }
    }
}

/// Wait budgets, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default budget for element conditions
    pub default_ms: u64,

    /// Budget for quick checks (menus, tooltips)
    pub short_ms: u64,

    /// Budget for page loads after navigation
    pub page_load_ms: u64,

    /// Budget for a run task to reach its final state
    pub task_ms: u64,

    /// Budget for a run to expose its SSH link
    pub ssh_link_ms: u64,

    /// Budget for a download to land on disk
    pub download_ms: u64,

    /// Delay between two polls of the same condition
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: 10_000,
            short_ms: 3_000,
            page_load_ms: 30_000,
            task_ms: 300_000,
            ssh_link_ms: 600_000,
            download_ms: 30_000,
            poll_interval_ms: 250,
        }
    }
}

impl TimeoutConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_ms)
    }

    pub fn short(&self) -> Duration {
        Duration::from_millis(self.short_ms)
    }

    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn task(&self) -> Duration {
        Duration::from_millis(self.task_ms)
    }

    pub fn ssh_link(&self) -> Duration {
        Duration::from_millis(self.ssh_link_ms)
    }

    pub fn download(&self) -> Duration {
        Duration::from_millis(self.download_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Failure artifacts and results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub output_dir: PathBuf,

    /// Capture a screenshot when a case fails
    pub screenshot_on_failure: bool,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("test-results"),
            screenshot_on_failure: true,
        }
    }
}

impl ArtifactsConfig {
    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }
}

/// Authentication helpers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Cookie carrying a bearer token for token-based login
    pub token_cookie: String,

    /// Whether the console offers impersonation from user management
    pub impersonation_enabled: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_cookie: "bearer".to_string(),
            impersonation_enabled: true,
        }
    }
}

/// Parameters of the built-in scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Tool launched by the run lifecycle scenario
    pub run_tool: String,

    /// Command executed over the run's SSH terminal
    pub ssh_command: String,

    /// Text the command must print
    pub ssh_expected: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            run_tool: "ubuntu".to_string(),
            ssh_command: "echo pagewalk-ssh-ok".to_string(),
            ssh_expected: "pagewalk-ssh-ok".to_string(),
        }
    }
}

impl SuiteConfig {
    /// Load configuration from file, falling back to defaults when missing
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `PAGEWALK_*` overrides from the process environment
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// Recognised keys: `BASE_URL`, `WEBDRIVER_URL`, `HEADLESS`,
    /// `DOWNLOAD_DIR`, `OUTPUT_DIR`, `RUN_TOOL`, `TIMEOUT_MS`, and for every identity
    /// name `N` (upper-cased) `N_LOGIN`, `N_PASSWORD`, `N_TOKEN`. A token wins
    /// over a password when both are set.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(url) = var("BASE_URL") {
            self.base_url = url;
        }
        if let Some(url) = var("WEBDRIVER_URL") {
            self.browser.webdriver_url = url;
        }
        if let Some(raw) = var("HEADLESS") {
            self.browser.headless = parse_bool("HEADLESS", &raw)?;
        }
        if let Some(dir) = var("DOWNLOAD_DIR") {
            self.browser.download_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("OUTPUT_DIR") {
            self.artifacts.output_dir = PathBuf::from(dir);
        }
        if let Some(tool) = var("RUN_TOOL") {
            self.scenarios.run_tool = tool;
        }
        if let Some(raw) = var("TIMEOUT_MS") {
            self.timeouts.default_ms = raw
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("TIMEOUT_MS is not a number: {raw}")))?;
        }

        let mut names: Vec<String> = self.identities.keys().cloned().collect();
        for builtin in ["admin", "user"] {
            if !names.iter().any(|n| n == builtin) {
                names.push(builtin.to_string());
            }
        }

        for name in names {
            let upper = name.to_ascii_uppercase();
            let login = var(&format!("{upper}_LOGIN"));
            let credentials = var(&format!("{upper}_TOKEN"))
                .map(Credentials::Token)
                .or_else(|| var(&format!("{upper}_PASSWORD")).map(Credentials::Password));

            match self.identities.get_mut(&name) {
                Some(identity) => {
                    if let Some(login) = login {
                        identity.login = login;
                    }
                    if let Some(credentials) = credentials {
                        identity.credentials = credentials;
                    }
                }
                None => {
                    if let (Some(login), Some(credentials)) = (login, credentials) {
                        self.identities.insert(name, Identity { login, credentials });
                    }
                }
            }
        }

        Ok(self)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "base_url must be an http(s) address: {}",
                self.base_url
            )));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "timeouts.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.timeouts.poll_interval_ms > self.timeouts.default_ms {
            return Err(Error::InvalidConfig(format!(
                "poll interval ({} ms) exceeds the default timeout ({} ms)",
                self.timeouts.poll_interval_ms, self.timeouts.default_ms
            )));
        }
        for (name, identity) in &self.identities {
            if identity.login.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "identity '{name}' has an empty login"
                )));
            }
        }
        Ok(())
    }

    /// Look up a named identity
    pub fn identity(&self, name: &str) -> Result<&Identity> {
        self.identities
            .get(name)
            .ok_or_else(|| Error::UnknownIdentity(name.to_string()))
    }

    /// Resolve a path relative to the console root
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            format!("{}/", base)
        } else if path.starts_with('/') {
            format!("{}{}", base, path)
        } else if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidConfig(format!(
            "{key} expects a boolean, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = SuiteConfig::default();
        config.validate().unwrap();
        assert_eq!(config.timeouts.default_timeout(), Duration::from_secs(10));
        assert!(config.artifacts.screenshot_on_failure);
    }

    #[test]
    fn test_parse_toml() {
        let config = SuiteConfig::from_toml(
            r#"
base_url = "https://console.example.com"

[identities.admin]
login = "PIPE_ADMIN"
credentials = { password = "admin-pass" }

[identities.user]
login = "pipe_user"
credentials = { token = "abc" }

[browser]
webdriver_url = "http://grid:4444"
kind = "firefox"
headless = false

[timeouts]
default_ms = 5000
"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://console.example.com");
        assert_eq!(config.browser.kind, BrowserKind::Firefox);
        assert!(!config.browser.headless);
        assert_eq!(config.timeouts.default_ms, 5000);
        // untouched sections keep their defaults
        assert_eq!(config.timeouts.poll_interval_ms, 250);
        let admin = config.identity("admin").unwrap();
        assert_eq!(admin.credentials, Credentials::Password("admin-pass".into()));
        let user = config.identity("user").unwrap();
        assert_eq!(user.credentials, Credentials::Token("abc".into()));
    }

    #[test]
    fn test_env_overrides() {
        let config = SuiteConfig::default()
            .with_overrides(env(&[
                ("PAGEWALK_BASE_URL", "https://ci.example.com/"),
                ("PAGEWALK_HEADLESS", "no"),
                ("PAGEWALK_ADMIN_LOGIN", "root"),
                ("PAGEWALK_ADMIN_PASSWORD", "pw"),
                ("PAGEWALK_ADMIN_TOKEN", "tok"),
            ]))
            .unwrap();

        assert_eq!(config.base_url, "https://ci.example.com/");
        assert!(!config.browser.headless);
        let admin = config.identity("admin").unwrap();
        assert_eq!(admin.login, "root");
        assert_eq!(admin.credentials, Credentials::Token("tok".into()));
        // user had no login in the environment, so it is not invented
        assert!(config.identity("user").is_err());
    }

    #[test]
    fn test_bad_env_values_are_rejected() {
        let err = SuiteConfig::default()
            .with_overrides(env(&[("PAGEWALK_HEADLESS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = SuiteConfig::default()
            .with_overrides(env(&[("PAGEWALK_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SuiteConfig::default();
        config.base_url = "console.example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = SuiteConfig::default();
        config.timeouts.poll_interval_ms = 20_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_url_joining() {
        let mut config = SuiteConfig::default();
        config.base_url = "https://console.example.com/".to_string();
        assert_eq!(config.url(""), "https://console.example.com/");
        assert_eq!(config.url("/library"), "https://console.example.com/library");
        assert_eq!(config.url("runs/42"), "https://console.example.com/runs/42");
        assert_eq!(config.url("https://other/x"), "https://other/x");
    }

    #[test]
    fn test_save_and_load_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pagewalk.toml");
        let mut config = SuiteConfig::default();
        config
            .identities
            .insert("admin".into(), Identity::with_password("admin", "pw"));
        config.save(&path).unwrap();

        let loaded = SuiteConfig::load(&path).unwrap();
        assert_eq!(loaded.identity("admin").unwrap().login, "admin");

        let missing = SuiteConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(missing.identities.is_empty());
    }
}
