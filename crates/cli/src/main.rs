//! pagewalk CLI - Main Entry Point
//!
//! Runs built-in scenario classes and YAML scenarios against a web console
//! through a WebDriver endpoint.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pagewalk_cli::commands::{self, check, driver, list, run};
use pagewalk_cli::output::{self, print_error};

/// pagewalk - page-object scenario harness for web consoles
#[derive(Parser)]
#[command(name = "pagewalk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = pagewalk_common::DEFAULT_CONFIG_FILE, env = "PAGEWALK_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenario classes and YAML scenarios
    Run(run::RunArgs),

    /// List runnable scenarios
    List(list::ListArgs),

    /// Validate the configuration and probe the console and driver
    Check(check::CheckArgs),

    /// Run a local WebDriver process until interrupted
    Driver(driver::DriverArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config = match commands::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    };

    let passed = match cli.command {
        Commands::Run(args) => run::execute(args, config, cli.format).await?,
        Commands::List(args) => {
            list::execute(args, &config, cli.format)?;
            true
        }
        Commands::Check(args) => check::execute(args, &config, cli.format).await?,
        Commands::Driver(args) => {
            driver::execute(args, &config).await?;
            true
        }
        Commands::Version => {
            println!("pagewalk v{}", pagewalk_common::VERSION);
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
