//! Check Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use pagewalk_common::SuiteConfig;
use pagewalk_e2e::driver::probe_url;

use crate::output::{print_error, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Also parse the YAML scenarios below this directory
    #[arg(long, value_name = "DIR")]
    specs: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct CheckRow {
    pub check: String,
    pub target: String,
    pub ok: bool,
    pub detail: String,
}

impl CheckRow {
    fn new(check: &str, target: impl Into<String>, outcome: Result<String>) -> Self {
        let (ok, detail) = match outcome {
            Ok(detail) => (true, detail),
            Err(e) => (false, format!("{:#}", e)),
        };
        Self {
            check: check.to_string(),
            target: target.into(),
            ok,
            detail,
        }
    }
}

impl TableDisplay for CheckRow {
    fn headers() -> Vec<&'static str> {
        vec!["CHECK", "TARGET", "OK", "DETAIL"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.check.clone(),
            self.target.clone(),
            if self.ok { "yes" } else { "no" }.to_string(),
            self.detail.clone(),
        ]
    }
}

async fn probe_console(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let resp = client.get(url).send().await?;
    if resp.status().is_server_error() {
        anyhow::bail!("console answered {}", resp.status());
    }
    Ok(format!("HTTP {}", resp.status()))
}

async fn probe_driver(url: &str) -> Result<String> {
    if probe_url(url).await? {
        Ok("ready".to_string())
    } else {
        anyhow::bail!("driver is up but not ready for new sessions")
    }
}

/// Validate the config and probe both endpoints; `Ok(false)` if any check failed
pub async fn execute(args: CheckArgs, config: &SuiteConfig, format: OutputFormat) -> Result<bool> {
    let mut rows = vec![CheckRow::new(
        "config",
        format!("{} identities", config.identities.len()),
        config.validate().map(|_| "valid".to_string()).map_err(Into::into),
    )];

    rows.push(CheckRow::new(
        "console",
        config.base_url.clone(),
        probe_console(&config.url("/")).await,
    ));
    rows.push(CheckRow::new(
        "webdriver",
        config.browser.webdriver_url.clone(),
        probe_driver(&config.browser.webdriver_url).await,
    ));

    if let Some(dir) = &args.specs {
        rows.push(CheckRow::new(
            "scenarios",
            dir.display().to_string(),
            super::load_specs(dir, None, None).map(|specs| format!("{} parsed", specs.len())),
        ));
    }

    print_list(&rows, format);

    let failed = rows.iter().filter(|r| !r.ok).count();
    if failed == 0 {
        print_success("All checks passed");
    } else {
        print_error(&format!("{} check(s) failed", failed));
    }
    Ok(failed == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_from_error_keeps_context() {
        let outcome: Result<String> =
            Err(anyhow::anyhow!("connection refused").context("probe failed"));
        let row = CheckRow::new("console", "http://127.0.0.1:1", outcome);
        assert!(!row.ok);
        assert_eq!(row.detail, "probe failed: connection refused");
    }

    #[tokio::test]
    async fn test_unreachable_driver_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(probe_driver(&format!("http://127.0.0.1:{}", port)).await.is_err());
    }
}
