//! Web terminal attached to a run

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use crate::expect::{assert_output_contains, strip_ansi};
use crate::locator::Locator;
use crate::wait::{wait_until, Probe};
use crate::webdriver::TabId;
use crate::within::Nested;

use super::{Page, PageCtx, RunLogPage};

pub const TERMINAL: Locator = Locator::id("terminal");
pub const TERMINAL_INPUT: Locator = Locator::id("terminal-input");
pub const TERMINAL_OUTPUT: Locator = Locator::id("terminal-output");

pub struct ShellPage<'s> {
    ctx: PageCtx<'s>,
}

super::page!(ShellPage, "shell", TERMINAL);

impl<'s> ShellPage<'s> {
    /// Type a command followed by Enter
    pub async fn execute(self, command: &str) -> E2eResult<Self> {
        info!("$ {}", command);
        self.session()?
            .press_keys(&TERMINAL_INPUT, &format!("{}\n", command))
            .await?;
        Ok(self)
    }

    /// Everything the terminal printed so far, escape sequences removed
    pub async fn output(&self) -> E2eResult<String> {
        let states = self.session()?.browser().query(&TERMINAL_OUTPUT).await?;
        Ok(states
            .into_iter()
            .next()
            .map(|s| strip_ansi(&s.text))
            .unwrap_or_default())
    }

    /// Wait for the accumulated output to contain `expected`
    pub async fn assert_output_contains(self, expected: &str) -> E2eResult<Self> {
        let session = self.session()?;
        let this = &self;
        let outcome = wait_until(
            session.clock(),
            session.expect().policy(),
            &format!("terminal output to contain {:?}", expected),
            || async move {
                let output = this.output().await?;
                if output.contains(expected) {
                    Ok(Probe::Ready(()))
                } else {
                    Ok(Probe::Pending(output))
                }
            },
        )
        .await;

        match outcome {
            Ok(()) => Ok(self),
            Err(E2eError::AssertionTimeout { last_observed, .. }) => {
                assert_output_contains(&last_observed, expected)?;
                Ok(self)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn wait_until_text_appears(self, token: &str) -> E2eResult<Self> {
        self.expect()?.wait_until_text_appears(token).await?;
        Ok(self)
    }
}

#[async_trait]
impl<'s> Nested<RunLogPage<'s>> for ShellPage<'s> {
    /// Tab the run log was showing in
    type Origin = TabId;

    async fn enter(parent: &RunLogPage<'s>) -> E2eResult<(Self, TabId)> {
        let href = parent.wait_for_ssh_link().await?;
        let session = parent.session()?;
        let origin = session.current_tab().await?;
        session.open_tab().await?;
        session.open(&href).await?;
        Ok((parent.page_ctx().arrive().await?, origin))
    }

    /// Close the terminal tab and return to the tab it was opened from
    async fn leave(parent: &RunLogPage<'s>, origin: TabId) -> E2eResult<()> {
        let session = parent.session()?;
        if session.current_tab().await? != origin {
            debug!("Closing terminal tab");
            session.close_tab(&origin).await?;
        }
        Ok(())
    }
}
