//! Log of a single run: tasks, status, SSH access

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::error::E2eResult;
use crate::locator::{Condition, ExpectationSpec, Locator};
use crate::within::Nested;

use super::{confirm_dialog, Page, PageCtx, ShellPage};

pub const RUN_LOG: Locator = Locator::id("run-log");
pub const RUN_ID: Locator = Locator::id("run-id");
pub const RUN_STATUS: Locator = Locator::id("run-status");
pub const SSH_LINK: Locator = Locator::id("ssh-link");
pub const PAUSE: Locator = Locator::id("run-pause");
pub const RESUME: Locator = Locator::id("run-resume");
pub const STOP: Locator = Locator::id("run-stop");

/// Attribute carrying the machine-readable status of runs and tasks
pub const TASK_STATUS_ATTR: &str = "data-status";

pub fn task_locator(name: &str) -> Locator {
    Locator::keyed("task", name)
}

/// Lifecycle state of a run as shown by the console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Scheduled,
    Running,
    Pausing,
    Paused,
    Resuming,
    Stopped,
    Success,
    Failure,
    Unknown(String),
}

impl RunStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => RunStatus::Scheduled,
            "RUNNING" => RunStatus::Running,
            "PAUSING" => RunStatus::Pausing,
            "PAUSED" => RunStatus::Paused,
            "RESUMING" => RunStatus::Resuming,
            "STOPPED" => RunStatus::Stopped,
            "SUCCESS" => RunStatus::Success,
            "FAILURE" => RunStatus::Failure,
            _ => RunStatus::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Scheduled => "SCHEDULED",
            RunStatus::Running => "RUNNING",
            RunStatus::Pausing => "PAUSING",
            RunStatus::Paused => "PAUSED",
            RunStatus::Resuming => "RESUMING",
            RunStatus::Stopped => "STOPPED",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failure => "FAILURE",
            RunStatus::Unknown(raw) => raw,
        }
    }

    /// Whether the run can no longer change state
    pub fn is_final(&self) -> bool {
        matches!(self, RunStatus::Stopped | RunStatus::Success | RunStatus::Failure)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Scheduled,
    Running,
    Success,
    Failure,
    Stopped,
    Unknown(String),
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" | "QUEUED" => TaskStatus::Scheduled,
            "RUNNING" => TaskStatus::Running,
            "SUCCESS" => TaskStatus::Success,
            "FAILURE" => TaskStatus::Failure,
            "STOPPED" => TaskStatus::Stopped,
            _ => TaskStatus::Unknown(raw.to_string()),
        }
    }
}

pub struct RunLogPage<'s> {
    ctx: PageCtx<'s>,
}

super::page!(RunLogPage, "run log", RUN_LOG);

impl<'s> RunLogPage<'s> {
    pub async fn run_id(&self) -> E2eResult<String> {
        Ok(self.session()?.text_of(&RUN_ID).await?.trim().to_string())
    }

    /// Status shown right now
    pub async fn status(&self) -> E2eResult<RunStatus> {
        let raw = self
            .session()?
            .browser()
            .attribute(&RUN_STATUS, TASK_STATUS_ATTR)
            .await?;
        Ok(RunStatus::parse(raw.as_deref().unwrap_or("")))
    }

    /// Wait, within the task budget, for the run to reach `status`
    pub async fn wait_for_status(&self, status: RunStatus) -> E2eResult<()> {
        let session = self.session()?;
        let spec = ExpectationSpec::new(
            RUN_STATUS,
            [Condition::AttributeEquals {
                name: TASK_STATUS_ATTR.to_string(),
                value: status.as_str().to_string(),
            }],
        )
        .within(session.config().timeouts.task());
        session.expect().ensure_spec(&spec).await?;
        Ok(())
    }

    pub async fn wait_for_task(self, name: &str) -> E2eResult<Self> {
        info!("Waiting for task {}", name);
        self.expect()?.wait_for_task(name).await?;
        Ok(self)
    }

    /// Address of the run's terminal once it is available
    pub async fn wait_for_ssh_link(&self) -> E2eResult<String> {
        self.expect()?.wait_for_ssh_link().await
    }

    pub async fn pause(self) -> E2eResult<Self> {
        info!("Pausing run");
        let session = self.session()?;
        session.click(&PAUSE).await?;
        confirm_dialog(session).await?;
        self.wait_for_status(RunStatus::Paused).await?;
        Ok(self)
    }

    pub async fn resume(self) -> E2eResult<Self> {
        info!("Resuming run");
        let session = self.session()?;
        session.click(&RESUME).await?;
        confirm_dialog(session).await?;
        self.wait_for_status(RunStatus::Running).await?;
        Ok(self)
    }

    pub async fn stop(self) -> E2eResult<Self> {
        info!("Stopping run");
        let session = self.session()?;
        session.click(&STOP).await?;
        confirm_dialog(session).await?;
        self.wait_for_status(RunStatus::Stopped).await?;
        Ok(self)
    }

    /// Open the run's terminal in a new tab.
    ///
    /// Prefer [`crate::within::perform_within`] with [`ShellPage`], which
    /// closes the tab again; this leaves it open.
    pub async fn ssh(&self) -> E2eResult<ShellPage<'s>> {
        ShellPage::enter(self).await.map(|(page, _)| page)
    }

    pub(crate) fn page_ctx(&self) -> PageCtx<'s> {
        self.ctx
    }
}
