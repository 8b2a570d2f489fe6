//! Runs scenario classes and YAML specs, with fixtures and result reporting

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use pagewalk_common::Identity;

use crate::error::{E2eError, E2eResult};
use crate::fixture::{Fixture, Janitor, TeardownReport, UiJanitor};
use crate::session::Session;
use crate::spec::TestSpec;
use crate::steps::{execute_step, StepResult};

/// A case declared by a scenario class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseInfo {
    pub name: String,
    /// Lower runs first; ties keep declaration order
    pub priority: i32,
    pub depends_on: Vec<String>,
}

impl CaseInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            depends_on: Vec::new(),
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn after(mut self, case: impl Into<String>) -> Self {
        self.depends_on.push(case.into());
        self
    }
}

/// Everything a case can reach: the session, the class fixture, a step log
pub struct ScenarioContext<'s> {
    session: &'s Session,
    fixture: Fixture,
    steps: Mutex<Vec<StepResult>>,
}

impl<'s> ScenarioContext<'s> {
    pub fn new(session: &'s Session, fixture: Fixture) -> Self {
        Self {
            session,
            fixture,
            steps: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    pub fn record_step(&self, step: StepResult) {
        self.steps.lock().push(step);
    }

    fn take_steps(&self) -> Vec<StepResult> {
        std::mem::take(&mut *self.steps.lock())
    }
}

/// A group of cases sharing setup, teardown and a fixture
#[async_trait]
pub trait ScenarioClass: Send {
    fn name(&self) -> &str;

    fn cases(&self) -> Vec<CaseInfo>;

    async fn setup(&mut self, _ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        Ok(())
    }

    async fn run_case(&mut self, case: &str, ctx: &ScenarioContext<'_>) -> E2eResult<()>;

    /// Class-specific cleanup, run before the fixture ledger is emptied
    async fn teardown(&mut self, _ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub status: CaseStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepResult>,
}

impl CaseResult {
    fn skipped(name: &str, reason: String) -> Self {
        Self {
            name: name.to_string(),
            status: CaseStatus::Skipped,
            duration_ms: 0,
            error: Some(reason),
            screenshot: None,
            steps: Vec::new(),
        }
    }
}

/// Result of one scenario class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassResult {
    pub name: String,
    pub setup_error: Option<String>,
    pub cases: Vec<CaseResult>,
    pub teardown: TeardownReport,
    pub duration_ms: u64,
}

impl ClassResult {
    pub fn count(&self, status: CaseStatus) -> usize {
        self.cases.iter().filter(|c| c.status == status).count()
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cleanup_failures: usize,
    pub duration_ms: u64,
    pub classes: Vec<ClassResult>,
}

impl SuiteResult {
    pub fn new(started_at: DateTime<Utc>, duration_ms: u64, classes: Vec<ClassResult>) -> Self {
        let count = |status: CaseStatus| -> usize { classes.iter().map(|c| c.count(status)).sum() };
        Self {
            started_at,
            total: classes.iter().map(|c| c.cases.len()).sum(),
            passed: count(CaseStatus::Passed),
            failed: count(CaseStatus::Failed),
            skipped: count(CaseStatus::Skipped),
            cleanup_failures: classes.iter().map(|c| c.teardown.failures.len()).sum(),
            duration_ms,
            classes,
        }
    }

    /// No case failed or was skipped
    pub fn success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// Run order of a class's cases
#[derive(Debug, Default)]
pub struct CasePlan {
    /// Every case after the cases it depends on
    pub ordered: Vec<CaseInfo>,
    /// Cases that can never run, with the reason
    pub unrunnable: Vec<(CaseInfo, String)>,
}

/// Order cases after their dependencies, lowest priority first among the
/// cases that are ready, then by declaration order.
///
/// Cases naming an unknown case, depending on such a case, or caught in a
/// dependency cycle end up in [`CasePlan::unrunnable`].
pub fn plan_cases(cases: Vec<CaseInfo>) -> CasePlan {
    let known: HashSet<String> = cases.iter().map(|c| c.name.clone()).collect();
    let mut plan = CasePlan::default();
    let mut pending: Vec<(usize, CaseInfo)> = Vec::new();

    for (index, case) in cases.into_iter().enumerate() {
        match case.depends_on.iter().find(|d| !known.contains(*d)) {
            Some(dep) => {
                let reason = format!("unknown dependency '{}'", dep);
                plan.unrunnable.push((case, reason));
            }
            None => pending.push((index, case)),
        }
    }

    let mut placed: HashSet<String> = HashSet::new();
    loop {
        let next = pending
            .iter()
            .enumerate()
            .filter(|(_, (_, case))| case.depends_on.iter().all(|d| placed.contains(d)))
            .min_by_key(|(_, (index, case))| (case.priority, *index))
            .map(|(position, _)| position);
        let Some(position) = next else { break };
        let (_, case) = pending.remove(position);
        placed.insert(case.name.clone());
        plan.ordered.push(case);
    }

    // what is left waits on a missing case or on a cycle
    let mut blocked: HashSet<String> = plan.unrunnable.iter().map(|(c, _)| c.name.clone()).collect();
    loop {
        let before = blocked.len();
        for (_, case) in &pending {
            if case.depends_on.iter().any(|d| blocked.contains(d)) {
                blocked.insert(case.name.clone());
            }
        }
        if blocked.len() == before {
            break;
        }
    }
    for (_, case) in pending {
        let reason = match case.depends_on.iter().find(|d| blocked.contains(*d)) {
            Some(dep) => format!("dependency '{}' cannot run", dep),
            None => format!("dependency cycle through '{}'", case.name),
        };
        plan.unrunnable.push((case, reason));
    }
    plan
}

/// The runnable cases of [`plan_cases`], in run order
pub fn order_cases(cases: Vec<CaseInfo>) -> Vec<CaseInfo> {
    plan_cases(cases).ordered
}

/// Drives scenario classes through one [`Session`]
pub struct ScenarioRunner<'s> {
    session: &'s Session,
    janitor: Option<&'s dyn Janitor>,
    cleanup_identity: Option<Identity>,
}

impl<'s> ScenarioRunner<'s> {
    /// Cleanup runs as the `admin` identity when one is configured
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            janitor: None,
            cleanup_identity: session.config().identity("admin").ok().cloned(),
        }
    }

    /// Use `janitor` instead of cleaning up through the console
    pub fn with_janitor(mut self, janitor: &'s dyn Janitor) -> Self {
        self.janitor = Some(janitor);
        self
    }

    pub fn with_cleanup_identity(mut self, identity: Option<Identity>) -> Self {
        self.cleanup_identity = identity;
        self
    }

    pub async fn run_suite(&self, classes: &mut [Box<dyn ScenarioClass>]) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();

        info!("Running {} scenario class(es)...", classes.len());
        for class in classes.iter_mut() {
            results.push(self.run_class(class.as_mut()).await);
        }

        let suite = SuiteResult::new(started_at, start.elapsed().as_millis() as u64, results);
        info!(
            "Results: {} passed, {} failed, {} skipped, {} cleanup failure(s) ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.cleanup_failures, suite.duration_ms
        );
        suite
    }

    /// Setup, every case in order, then teardown whatever happened
    pub async fn run_class(&self, class: &mut dyn ScenarioClass) -> ClassResult {
        let start = Instant::now();
        let name = class.name().to_string();
        let ctx = ScenarioContext::new(self.session, Fixture::new(name.clone()));
        let CasePlan { ordered: cases, unrunnable } = plan_cases(class.cases());
        info!("Scenario class {} ({} case(s))", name, cases.len() + unrunnable.len());

        let setup_error = match class.setup(&ctx).await.and_then(|()| ctx.fixture().mark_ready()) {
            Ok(()) => None,
            Err(e) => {
                error!("✗ {} setup failed: {}", name, e);
                Some(e.to_string())
            }
        };

        let mut results = Vec::new();
        let mut passed: HashSet<String> = HashSet::new();
        for case in &cases {
            if let Some(reason) = &setup_error {
                results.push(CaseResult::skipped(&case.name, format!("setup failed: {}", reason)));
                continue;
            }
            if let Some(dep) = case.depends_on.iter().find(|d| !passed.contains(*d)) {
                warn!("- {} skipped: {} did not pass", case.name, dep);
                results.push(CaseResult::skipped(
                    &case.name,
                    format!("dependency '{}' did not pass", dep),
                ));
                continue;
            }

            let result = self.run_case(class, &name, case, &ctx).await;
            if result.status == CaseStatus::Passed {
                passed.insert(case.name.clone());
            }
            results.push(result);
        }
        for (case, reason) in unrunnable {
            warn!("- {} skipped: {}", case.name, reason);
            results.push(CaseResult::skipped(&case.name, reason));
        }

        if let Err(e) = class.teardown(&ctx).await {
            warn!("{} teardown failed: {}", name, e);
        }
        let teardown = match self.janitor {
            Some(janitor) => ctx.fixture().teardown(janitor).await,
            None => {
                let janitor = UiJanitor::new(self.session, self.cleanup_identity.clone());
                ctx.fixture().teardown(&janitor).await
            }
        };

        ClassResult {
            name,
            setup_error,
            cases: results,
            teardown,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn run_case(
        &self,
        class: &mut dyn ScenarioClass,
        class_name: &str,
        case: &CaseInfo,
        ctx: &ScenarioContext<'_>,
    ) -> CaseResult {
        let start = Instant::now();
        debug!("Running case {}::{}", class_name, case.name);

        let outcome = match ctx.fixture().begin_case() {
            Ok(()) => class.run_case(&case.name, ctx).await,
            Err(e) => Err(e),
        };
        if let Err(e) = ctx.fixture().finish_case(outcome.is_ok()) {
            warn!("{}", e);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let steps = ctx.take_steps();
        match outcome {
            Ok(()) => {
                info!("✓ {}::{} ({} ms)", class_name, case.name, duration_ms);
                CaseResult {
                    name: case.name.clone(),
                    status: CaseStatus::Passed,
                    duration_ms,
                    error: None,
                    screenshot: None,
                    steps,
                }
            }
            Err(e) => {
                error!("✗ {}::{} - {}", class_name, case.name, e);
                let artifacts = &self.session.config().artifacts;
                let screenshot = if artifacts.screenshot_on_failure {
                    self.session
                        .try_screenshot(&artifacts.screenshot_dir(), &format!("{}-{}", class_name, case.name))
                        .await
                } else {
                    None
                };
                CaseResult {
                    name: case.name.clone(),
                    status: CaseStatus::Failed,
                    duration_ms,
                    error: Some(e.to_string()),
                    screenshot,
                    steps,
                }
            }
        }
    }
}

/// Write results as pretty JSON to `dir/test-results.json`
pub fn write_results(results: &SuiteResult, dir: &Path) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// YAML scenarios run as the cases of one class
pub struct SpecClass {
    name: String,
    specs: Vec<TestSpec>,
}

impl SpecClass {
    pub fn new(name: impl Into<String>, specs: Vec<TestSpec>) -> Self {
        Self {
            name: name.into(),
            specs,
        }
    }
}

#[async_trait]
impl ScenarioClass for SpecClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn cases(&self) -> Vec<CaseInfo> {
        self.specs
            .iter()
            .map(|s| CaseInfo {
                name: s.name.clone(),
                priority: s.priority,
                depends_on: s.depends_on.clone(),
            })
            .collect()
    }

    async fn run_case(&mut self, case: &str, ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        let spec = self
            .specs
            .iter()
            .find(|s| s.name == case)
            .ok_or_else(|| E2eError::SpecParse(format!("Scenario not found: {}", case)))?;
        let session = ctx.session();

        if let Some(name) = &spec.login_as {
            let identity = session.config().identity(name)?.clone();
            session.open("/").await?;
            session.login_as(&identity).await?;
        }

        for step in &spec.steps {
            let result = execute_step(session, step).await;
            let failure = (!result.success).then(|| {
                (
                    result.step_name.clone(),
                    result.error.clone().unwrap_or_default(),
                )
            });
            ctx.record_step(result);
            if let Some((step, reason)) = failure {
                return Err(E2eError::StepFailed { step, reason });
            }
        }
        Ok(())
    }
}
