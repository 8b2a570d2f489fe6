//! Run Command

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use pagewalk_common::SuiteConfig;
use pagewalk_e2e::scenarios::{self, BUILTIN_NAMES};
use pagewalk_e2e::{
    write_results, CaseStatus, DriverConfig, DriverHandle, NoopJanitor, ScenarioClass,
    ScenarioRunner, Session, SpecClass, SuiteResult,
};

use crate::output::{
    print_error, print_list, print_success, print_warning, status_label, truncate, OutputFormat,
    TableDisplay,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Built-in scenario class to run (repeatable; all of them when neither
    /// this nor --specs is given)
    #[arg(short, long = "suite", value_name = "NAME")]
    suites: Vec<String>,

    /// Directory of YAML scenarios
    #[arg(long, value_name = "DIR")]
    specs: Option<PathBuf>,

    /// Run only YAML scenarios carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only YAML scenarios whose name contains this
    #[arg(short, long)]
    name: Option<String>,

    /// Directory for results and screenshots
    #[arg(short, long, env = "PAGEWALK_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Spawn a local driver instead of using the configured endpoint
    #[arg(long)]
    spawn_driver: bool,

    /// Leave created resources in the console instead of deleting them
    #[arg(long)]
    keep_resources: bool,
}

/// One case of the run, flattened for display
#[derive(Serialize)]
pub struct CaseRow {
    pub class: String,
    pub case: String,
    pub status: CaseStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
}

impl TableDisplay for CaseRow {
    fn headers() -> Vec<&'static str> {
        vec!["CLASS", "CASE", "STATUS", "DURATION", "ERROR"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.class.clone(),
            self.case.clone(),
            status_label(self.status),
            format!("{} ms", self.duration_ms),
            self.error.as_deref().map(|e| truncate(e, 80)).unwrap_or_default(),
        ]
    }
}

fn rows(results: &SuiteResult) -> Vec<CaseRow> {
    results
        .classes
        .iter()
        .flat_map(|class| {
            class.cases.iter().map(move |case| CaseRow {
                class: class.name.clone(),
                case: case.name.clone(),
                status: case.status,
                duration_ms: case.duration_ms,
                error: case.error.clone(),
                screenshot: case.screenshot.clone(),
            })
        })
        .collect()
}

/// Scenario classes selected by `args`
pub fn select_classes(args: &RunArgs, config: &SuiteConfig) -> Result<Vec<Box<dyn ScenarioClass>>> {
    let mut classes: Vec<Box<dyn ScenarioClass>> = Vec::new();

    if args.suites.is_empty() && args.specs.is_none() {
        classes.extend(scenarios::all(config));
    }
    for name in &args.suites {
        match scenarios::builtin(name, config) {
            Some(class) => classes.push(class),
            None => bail!(
                "Unknown suite '{}' (available: {})",
                name,
                BUILTIN_NAMES.join(", ")
            ),
        }
    }

    if let Some(dir) = &args.specs {
        let specs = super::load_specs(dir, args.tag.as_deref(), args.name.as_deref())?;
        if specs.is_empty() {
            warn!("No YAML scenarios in {} match the filters", dir.display());
        } else {
            info!("Loaded {} YAML scenario(s) from {}", specs.len(), dir.display());
            classes.push(Box::new(SpecClass::new("specs", specs)));
        }
    }

    Ok(classes)
}

/// Run the selected classes; `Ok(false)` when any case did not pass
pub async fn execute(args: RunArgs, mut config: SuiteConfig, format: OutputFormat) -> Result<bool> {
    if let Some(output) = &args.output {
        config.artifacts.output_dir = output.clone();
    }
    if args.headed {
        config.browser.headless = false;
    }

    let mut classes = select_classes(&args, &config)?;
    if classes.is_empty() {
        bail!("Nothing to run");
    }

    let mut driver = if args.spawn_driver {
        let driver = DriverHandle::spawn(DriverConfig::for_browser(&config.browser)).await?;
        config.browser.webdriver_url = driver.url().to_string();
        Some(driver)
    } else {
        None
    };

    let output_dir = config.artifacts.output_dir.clone();
    let session = Session::connect(config)
        .await
        .context("Failed to open a browser session")?;

    let keep = NoopJanitor;
    let mut runner = ScenarioRunner::new(&session);
    if args.keep_resources {
        warn!("Keeping every resource the run creates");
        runner = runner.with_janitor(&keep);
    }
    let results = runner.run_suite(&mut classes).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    if let Some(driver) = driver.as_mut() {
        if let Err(e) = driver.stop().await {
            warn!("Failed to stop driver: {}", e);
        }
    }

    let path = write_results(&results, &output_dir)?;

    print_list(&rows(&results), format);
    if results.cleanup_failures > 0 {
        print_warning(&format!(
            "{} resource(s) could not be cleaned up, see {}",
            results.cleanup_failures,
            path.display()
        ));
    }

    let summary = format!(
        "{} passed, {} failed, {} skipped in {} ms",
        results.passed, results.failed, results.skipped, results.duration_ms
    );
    if results.success() {
        print_success(&summary);
    } else {
        print_error(&summary);
    }

    Ok(results.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(suites: &[&str], specs: Option<PathBuf>) -> RunArgs {
        RunArgs {
            suites: suites.iter().map(|s| s.to_string()).collect(),
            specs,
            tag: None,
            name: None,
            output: None,
            headed: false,
            spawn_driver: false,
            keep_resources: false,
        }
    }

    #[derive(clap::Parser)]
    struct Wrapper {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_keep_resources_flag() {
        use clap::Parser;

        let parsed = Wrapper::try_parse_from(["run", "--keep-resources", "-s", "storage-lifecycle"]).unwrap();
        assert!(parsed.run.keep_resources);
        assert_eq!(parsed.run.suites, vec!["storage-lifecycle"]);
        assert!(!Wrapper::try_parse_from(["run"]).unwrap().run.keep_resources);
    }

    #[test]
    fn test_defaults_to_every_builtin() {
        let classes = select_classes(&args(&[], None), &SuiteConfig::default()).unwrap();
        assert_eq!(classes.len(), BUILTIN_NAMES.len());
    }

    #[test]
    fn test_named_suite() {
        let classes =
            select_classes(&args(&["storage-lifecycle"], None), &SuiteConfig::default()).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name(), "StorageLifecycle");
    }

    #[test]
    fn test_unknown_suite_is_rejected() {
        let err = select_classes(&args(&["nope"], None), &SuiteConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("storage-lifecycle"));
    }

    #[test]
    fn test_specs_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("login.yaml"),
            "name: login\nsteps:\n  - action: open\n",
        )
        .unwrap();

        let classes =
            select_classes(&args(&[], Some(dir.path().to_path_buf())), &SuiteConfig::default())
                .unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name(), "specs");
        assert_eq!(classes[0].cases()[0].name, "login");
    }
}
