//! Per-scenario-class fixtures: unique names, a cleanup ledger and teardown
//!
//! A [`Fixture`] belongs to exactly one scenario class run. Resources are
//! claimed (named and recorded) before they are created so that teardown sees
//! them even when creation fails half way. Teardown never fails: every
//! cleanup runs in isolation and problems are collected in a
//! [`TeardownReport`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use pagewalk_common::{Identity, ResourceKind, ResourceRef, UniqueNames};

use crate::error::{E2eError, E2eResult};
use crate::locator::{Condition, ExpectationSpec, Locator};
use crate::pages::{library, runs, settings, tools};
use crate::session::Session;

/// Lifecycle of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureState {
    #[default]
    Uninitialized,
    Ready,
    Running,
    Passed,
    Failed,
    TeardownAttempted,
    Closed,
}

impl FixtureState {
    pub fn can_transition_to(self, next: FixtureState) -> bool {
        use FixtureState::*;
        matches!(
            (self, next),
            (Uninitialized, Ready)
                | (Ready, Running)
                | (Running, Passed)
                | (Running, Failed)
                | (Passed, Running)
                | (Failed, Running)
                | (Uninitialized, TeardownAttempted)
                | (Ready, TeardownAttempted)
                | (Running, TeardownAttempted)
                | (Passed, TeardownAttempted)
                | (Failed, TeardownAttempted)
                | (TeardownAttempted, Closed)
        )
    }
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixtureState::Uninitialized => "uninitialized",
            FixtureState::Ready => "ready",
            FixtureState::Running => "running",
            FixtureState::Passed => "passed",
            FixtureState::Failed => "failed",
            FixtureState::TeardownAttempted => "teardown_attempted",
            FixtureState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What a cleanup action found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    AlreadyAbsent,
}

/// Deletes fixture resources from the system under test
#[async_trait]
pub trait Janitor: Send + Sync {
    /// Called once before the first deletion
    async fn prepare(&self) -> E2eResult<()> {
        Ok(())
    }

    async fn delete_if_exists(&self, resource: &ResourceRef) -> E2eResult<Removal>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupFailure {
    pub resource: ResourceRef,
    pub reason: String,
}

impl CleanupFailure {
    pub fn into_error(self) -> E2eError {
        E2eError::FixtureCleanup {
            resource: self.resource.to_string(),
            reason: self.reason,
        }
    }
}

/// Outcome of a teardown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    pub removed: Vec<ResourceRef>,
    pub already_absent: Vec<ResourceRef>,
    pub failures: Vec<CleanupFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.removed.len() + self.already_absent.len() + self.failures.len()
    }
}

/// Fixture owned by one scenario class run
#[derive(Debug)]
pub struct Fixture {
    class: String,
    state: Mutex<FixtureState>,
    names: Mutex<UniqueNames>,
    ledger: Mutex<Vec<ResourceRef>>,
    report: Mutex<Option<TeardownReport>>,
}

impl Fixture {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            state: Mutex::new(FixtureState::Uninitialized),
            names: Mutex::new(UniqueNames::new()),
            ledger: Mutex::new(Vec::new()),
            report: Mutex::new(None),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn state(&self) -> FixtureState {
        *self.state.lock()
    }

    fn transition(&self, next: FixtureState) -> E2eResult<()> {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return Err(E2eError::InvalidStateTransition {
                from: state.to_string(),
                to: next.to_string(),
            });
        }
        debug!("fixture {}: {} -> {}", self.class, *state, next);
        *state = next;
        Ok(())
    }

    /// `prefix-xxxxxxxx`, unique within this fixture
    pub fn unique_name(&self, prefix: &str) -> E2eResult<String> {
        Ok(self.names.lock().next(prefix)?)
    }

    /// Unique name for a resource of `kind`, not yet recorded for cleanup
    pub fn name(&self, kind: ResourceKind) -> E2eResult<String> {
        self.unique_name(kind.name_prefix())
    }

    /// Name a resource and record it for cleanup before it is created
    pub fn claim(&self, kind: ResourceKind) -> E2eResult<ResourceRef> {
        let resource = ResourceRef::new(kind, self.name(kind)?);
        self.register(resource.clone());
        Ok(resource)
    }

    /// Record an existing resource for cleanup; duplicates are ignored
    pub fn register(&self, resource: ResourceRef) {
        let mut ledger = self.ledger.lock();
        if !ledger.contains(&resource) {
            debug!("fixture {}: registered {}", self.class, resource);
            ledger.push(resource);
        }
    }

    pub fn resources(&self) -> Vec<ResourceRef> {
        self.ledger.lock().clone()
    }

    pub fn mark_ready(&self) -> E2eResult<()> {
        self.transition(FixtureState::Ready)
    }

    pub fn begin_case(&self) -> E2eResult<()> {
        self.transition(FixtureState::Running)
    }

    pub fn finish_case(&self, passed: bool) -> E2eResult<()> {
        self.transition(if passed {
            FixtureState::Passed
        } else {
            FixtureState::Failed
        })
    }

    /// Delete every recorded resource, newest first.
    ///
    /// Safe to call more than once; later calls return the first report
    /// without touching the system again.
    pub async fn teardown(&self, janitor: &dyn Janitor) -> TeardownReport {
        let cached = self.report.lock().clone();
        if let Some(report) = cached {
            debug!("fixture {}: teardown already done", self.class);
            return report;
        }

        if let Err(e) = self.transition(FixtureState::TeardownAttempted) {
            warn!("fixture {}: {}", self.class, e);
            *self.state.lock() = FixtureState::TeardownAttempted;
        }

        let resources: Vec<ResourceRef> = self.ledger.lock().iter().rev().cloned().collect();
        let mut report = TeardownReport::default();

        if !resources.is_empty() {
            info!(
                "fixture {}: cleaning up {} resource(s) of {} name(s) issued",
                self.class,
                resources.len(),
                self.names.lock().issued()
            );
            match janitor.prepare().await {
                Ok(()) => {
                    for resource in resources {
                        match janitor.delete_if_exists(&resource).await {
                            Ok(Removal::Removed) => report.removed.push(resource),
                            Ok(Removal::AlreadyAbsent) => {
                                debug!("{} already absent", resource);
                                report.already_absent.push(resource);
                            }
                            Err(e) => {
                                warn!("Cleanup of {} failed: {}", resource, e);
                                report.failures.push(CleanupFailure {
                                    resource,
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("fixture {}: cleanup could not start: {}", self.class, e);
                    report.failures = resources
                        .into_iter()
                        .map(|resource| CleanupFailure {
                            resource,
                            reason: format!("cleanup could not start: {}", e),
                        })
                        .collect();
                }
            }
        }

        if !report.is_clean() {
            warn!(
                "fixture {}: {} cleanup failure(s) left behind",
                self.class,
                report.failures.len()
            );
        }

        *self.report.lock() = Some(report.clone());
        *self.state.lock() = FixtureState::Closed;
        report
    }
}

/// Removes resources through the console, logged in as an admin
pub struct UiJanitor<'s> {
    session: &'s Session,
    identity: Option<Identity>,
}

impl<'s> UiJanitor<'s> {
    /// `identity` is who cleans up; `None` keeps whoever is logged in
    pub fn new(session: &'s Session, identity: Option<Identity>) -> Self {
        Self { session, identity }
    }

    /// Short poll for a list entry; absent after the budget means gone
    async fn present(&self, locator: Locator) -> E2eResult<bool> {
        let spec = ExpectationSpec::new(locator, [Condition::Visible])
            .within(self.session.config().timeouts.short());
        match self.session.expect().ensure_spec(&spec).await {
            Ok(_) => Ok(true),
            Err(E2eError::AssertionTimeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Janitor for UiJanitor<'_> {
    async fn prepare(&self) -> E2eResult<()> {
        self.session.stop_impersonation().await.ok();
        let Some(identity) = &self.identity else {
            if self.session.is_logged_in() {
                return Ok(());
            }
            return Err(E2eError::NotLoggedIn);
        };
        let current = self.session.identity();
        if current.as_ref().map(|c| c.is(&identity.login)) != Some(true) {
            self.session.open("/").await?;
            self.session.login_as(identity).await?;
        }
        Ok(())
    }

    async fn delete_if_exists(&self, resource: &ResourceRef) -> E2eResult<Removal> {
        let home = self.session.home()?;
        let name = resource.name.as_str();

        match resource.kind {
            ResourceKind::Storage => {
                let library = home.library().await?;
                if !self.present(library::item(name)).await? {
                    return Ok(Removal::AlreadyAbsent);
                }
                library.open_storage(name).await?.delete().await?;
            }
            ResourceKind::Folder | ResourceKind::Pipeline => {
                let library = home.library().await?;
                if !self.present(library::item(name)).await? {
                    return Ok(Removal::AlreadyAbsent);
                }
                library.delete_item(name).await?;
            }
            ResourceKind::Tool => {
                let page = home.tools().await?;
                if !self.present(tools::tool(name)).await? {
                    return Ok(Removal::AlreadyAbsent);
                }
                page.delete_tool(name).await?;
            }
            ResourceKind::Run => {
                let page = home.runs().await?.active().await?;
                if !self.present(runs::run_row(name)).await? {
                    return Ok(Removal::AlreadyAbsent);
                }
                if page.status_of(name).await?.is_final() {
                    return Ok(Removal::AlreadyAbsent);
                }
                page.stop_run(name).await?;
            }
            ResourceKind::User => {
                let tab = home.settings().await?.user_management().await?;
                self.session.type_into(&settings::USER_SEARCH, name).await?;
                if !self.present(settings::user_row(name)).await? {
                    return Ok(Removal::AlreadyAbsent);
                }
                tab.delete_user(name).await?;
            }
        }
        Ok(Removal::Removed)
    }
}

/// Janitor that leaves every resource in place, for runs whose leftovers
/// are inspected by hand afterwards
#[derive(Debug, Default)]
pub struct NoopJanitor;

#[async_trait]
impl Janitor for NoopJanitor {
    async fn delete_if_exists(&self, resource: &ResourceRef) -> E2eResult<Removal> {
        info!("keeping {}", resource);
        Ok(Removal::AlreadyAbsent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Scripted outcome per resource name; records call order
    #[derive(Default)]
    struct ScriptedJanitor {
        outcomes: HashMap<String, Result<Removal, String>>,
        calls: Mutex<Vec<String>>,
        prepare_error: Option<String>,
    }

    impl ScriptedJanitor {
        fn with(mut self, name: &str, outcome: Result<Removal, &str>) -> Self {
            self.outcomes
                .insert(name.to_string(), outcome.map_err(|e| e.to_string()));
            self
        }
    }

    #[async_trait]
    impl Janitor for ScriptedJanitor {
        async fn prepare(&self) -> E2eResult<()> {
            match &self.prepare_error {
                Some(reason) => Err(E2eError::Authentication {
                    login: "admin".into(),
                    reason: reason.clone(),
                }),
                None => Ok(()),
            }
        }

        async fn delete_if_exists(&self, resource: &ResourceRef) -> E2eResult<Removal> {
            self.calls.lock().push(resource.name.clone());
            match self.outcomes.get(&resource.name) {
                Some(Ok(removal)) => Ok(*removal),
                Some(Err(reason)) => Err(E2eError::StepFailed {
                    step: "delete".into(),
                    reason: reason.clone(),
                }),
                None => Ok(Removal::Removed),
            }
        }
    }

    #[test]
    fn test_claimed_names_are_unique_and_recorded() {
        let fixture = Fixture::new("StorageLifecycle");
        let a = fixture.claim(ResourceKind::Storage).unwrap();
        let b = fixture.claim(ResourceKind::Storage).unwrap();
        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with("storage-"));
        assert_eq!(fixture.resources(), vec![a, b]);
    }

    #[test]
    fn test_register_ignores_duplicates() {
        let fixture = Fixture::new("c");
        let r = ResourceRef::new(ResourceKind::Folder, "folder-1");
        fixture.register(r.clone());
        fixture.register(r);
        assert_eq!(fixture.resources().len(), 1);
    }

    #[test]
    fn test_state_machine() {
        let fixture = Fixture::new("c");
        assert!(fixture.begin_case().is_err());
        fixture.mark_ready().unwrap();
        fixture.begin_case().unwrap();
        fixture.finish_case(false).unwrap();
        assert_eq!(fixture.state(), FixtureState::Failed);
        fixture.begin_case().unwrap();
        fixture.finish_case(true).unwrap();
        assert_eq!(fixture.state(), FixtureState::Passed);
        assert!(matches!(
            fixture.mark_ready(),
            Err(E2eError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_teardown_runs_every_cleanup_in_reverse() {
        let fixture = Fixture::new("c");
        for name in ["first", "second", "third"] {
            fixture.register(ResourceRef::new(ResourceKind::Storage, name));
        }
        let janitor = ScriptedJanitor::default()
            .with("second", Err("console returned 500"))
            .with("first", Ok(Removal::AlreadyAbsent));

        let report = fixture.teardown(&janitor).await;
        assert_eq!(*janitor.calls.lock(), vec!["third", "second", "first"]);
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.already_absent.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].resource.name, "second");
        assert!(!report.is_clean());
        assert_eq!(fixture.state(), FixtureState::Closed);
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let fixture = Fixture::new("c");
        fixture.register(ResourceRef::new(ResourceKind::Tool, "tool-1"));
        let janitor = ScriptedJanitor::default();

        let first = fixture.teardown(&janitor).await;
        let second = fixture.teardown(&janitor).await;
        assert_eq!(first, second);
        assert_eq!(janitor.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_teardown_after_failed_setup() {
        let fixture = Fixture::new("c");
        fixture.claim(ResourceKind::Storage).unwrap();
        let report = fixture.teardown(&ScriptedJanitor::default()).await;
        assert_eq!(report.removed.len(), 1);
        assert_eq!(fixture.state(), FixtureState::Closed);
    }

    #[tokio::test]
    async fn test_prepare_failure_is_reported_per_resource() {
        let fixture = Fixture::new("c");
        fixture.claim(ResourceKind::Storage).unwrap();
        fixture.claim(ResourceKind::Folder).unwrap();
        let janitor = ScriptedJanitor {
            prepare_error: Some("admin is blocked".into()),
            ..Default::default()
        };

        let report = fixture.teardown(&janitor).await;
        assert_eq!(report.failures.len(), 2);
        assert!(janitor.calls.lock().is_empty());
        let err = report.failures[0].clone().into_error();
        assert!(matches!(err, E2eError::FixtureCleanup { .. }));
    }

    #[tokio::test]
    async fn test_empty_ledger_skips_janitor() {
        let fixture = Fixture::new("c");
        let janitor = ScriptedJanitor {
            prepare_error: Some("unreachable".into()),
            ..Default::default()
        };
        let report = fixture.teardown(&janitor).await;
        assert!(report.is_clean());
        assert_eq!(report.attempted(), 0);
    }
}
