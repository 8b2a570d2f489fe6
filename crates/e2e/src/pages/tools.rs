use tracing::info;

use crate::error::E2eResult;
use crate::locator::{Condition, Locator};

use super::{confirm_dialog, Page, PageCtx, RunLogPage};

pub const TOOLS_LIST: Locator = Locator::id("tools-list");
pub const TOOL_RUN: Locator = Locator::id("tool-run");
pub const LAUNCH_CONFIRM: Locator = Locator::id("launch-confirm");

pub fn tool(name: &str) -> Locator {
    Locator::keyed("tool", name)
}

pub fn tool_delete(name: &str) -> Locator {
    Locator::keyed("tool-delete", name)
}

pub struct ToolsPage<'s> {
    ctx: PageCtx<'s>,
}

super::page!(ToolsPage, "tools", TOOLS_LIST);

impl<'s> ToolsPage<'s> {
    /// Immediate check, no waiting
    pub async fn has_tool(&self, name: &str) -> E2eResult<bool> {
        self.session()?.is_displayed(&tool(name)).await
    }

    pub async fn ensure_listed(&self, name: &str) -> E2eResult<()> {
        self.expect()?.ensure(&tool(name), &[Condition::Visible]).await?;
        Ok(())
    }

    /// Launch `name` with default parameters and follow to the new run
    pub async fn launch(self, name: &str) -> E2eResult<RunLogPage<'s>> {
        info!("Launching tool {}", name);
        let session = self.session()?;
        session.click(&tool(name)).await?;
        session.click(&TOOL_RUN).await?;
        session.click(&LAUNCH_CONFIRM).await?;
        self.ctx.arrive().await
    }

    pub async fn delete_tool(self, name: &str) -> E2eResult<Self> {
        info!("Deleting tool {}", name);
        let session = self.session()?;
        session.click(&tool_delete(name)).await?;
        confirm_dialog(session).await?;
        self.expect()?.ensure(&tool(name), &[Condition::Absent]).await?;
        Ok(self)
    }
}
