//! Run list with active and completed tabs

use crate::error::E2eResult;
use crate::locator::{Condition, Locator};
use crate::wait::{wait_until, Probe};

use super::run_log::{RunStatus, RUN_ID, TASK_STATUS_ATTR};
use super::{confirm_dialog, Page, PageCtx, RunLogPage};

pub const RUNS_TABLE: Locator = Locator::id("runs-table");
pub const ACTIVE_TAB: Locator = Locator::id("runs-active");
pub const COMPLETED_TAB: Locator = Locator::id("runs-completed");

pub fn run_row(id: &str) -> Locator {
    Locator::keyed("run-row", id)
}

pub fn run_stop(id: &str) -> Locator {
    Locator::keyed("run-stop", id)
}

pub struct RunsPage<'s> {
    ctx: PageCtx<'s>,
}

super::page!(RunsPage, "runs", RUNS_TABLE);

impl<'s> RunsPage<'s> {
    pub async fn active(self) -> E2eResult<Self> {
        self.session()?.click(&ACTIVE_TAB).await?;
        self.ctx.arrive().await
    }

    pub async fn completed(self) -> E2eResult<Self> {
        self.session()?.click(&COMPLETED_TAB).await?;
        self.ctx.arrive().await
    }

    pub async fn ensure_listed(&self, id: &str) -> E2eResult<()> {
        self.expect()?.ensure(&run_row(id), &[Condition::Visible]).await?;
        Ok(())
    }

    /// Immediate check, no waiting
    pub async fn has_run(&self, id: &str) -> E2eResult<bool> {
        self.session()?.is_displayed(&run_row(id)).await
    }

    pub async fn status_of(&self, id: &str) -> E2eResult<RunStatus> {
        self.ensure_listed(id).await?;
        let raw = self
            .session()?
            .browser()
            .attribute(&run_row(id), TASK_STATUS_ATTR)
            .await?;
        Ok(RunStatus::parse(raw.as_deref().unwrap_or("")))
    }

    pub async fn open_run(self, id: &str) -> E2eResult<RunLogPage<'s>> {
        self.session()?.click(&run_row(id)).await?;
        let log: RunLogPage<'s> = self.ctx.arrive().await?;
        log.expect()?
            .ensure(&RUN_ID, &[Condition::HasText(id.to_string())])
            .await?;
        Ok(log)
    }

    /// Stop a run from the list and wait until it is stopped or has left
    /// the list
    pub async fn stop_run(self, id: &str) -> E2eResult<Self> {
        let session = self.session()?;
        session.click(&run_stop(id)).await?;
        confirm_dialog(session).await?;

        let browser = session.browser();
        let row = &run_row(id);
        wait_until(
            session.clock(),
            session.expect().policy_for(session.config().timeouts.task()),
            &format!("run {} to stop", id),
            || async move {
                let status = browser.attribute(row, TASK_STATUS_ATTR).await?;
                match status.as_deref().map(RunStatus::parse) {
                    None | Some(RunStatus::Stopped) => Ok(Probe::Ready(())),
                    Some(other) => Ok(Probe::Pending(format!("status {}", other))),
                }
            },
        )
        .await?;
        Ok(self)
    }
}
