//! Driver Command

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use pagewalk_common::SuiteConfig;
use pagewalk_e2e::{DriverConfig, DriverHandle};

use crate::output::{print_info, print_success};

#[derive(Args, Debug)]
pub struct DriverArgs {
    /// Driver binary (defaults to the configured browser's driver)
    #[arg(long)]
    binary: Option<PathBuf>,

    /// Port to listen on (default: a free port)
    #[arg(long)]
    port: Option<u16>,

    /// Extra arguments passed to the driver
    #[arg(last = true)]
    args: Vec<String>,
}

/// Run a driver in the foreground until Ctrl-C
pub async fn execute(args: DriverArgs, config: &SuiteConfig) -> Result<()> {
    let mut driver_config = DriverConfig::for_browser(&config.browser);
    if let Some(binary) = args.binary {
        driver_config.binary_path = binary;
    }
    driver_config.port = args.port;
    driver_config.args = args.args;

    let mut driver = DriverHandle::spawn(driver_config).await?;
    print_success(&format!("Driver listening at {}", driver.url()));
    print_info(&format!("Use PAGEWALK_WEBDRIVER_URL={} to run against it", driver.url()));

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, stopping driver");
    driver.stop().await?;
    Ok(())
}
