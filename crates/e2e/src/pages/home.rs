//! Landing page after login

use crate::error::E2eResult;
use crate::locator::{Condition, Locator};
use crate::session::Session;

use super::{LibraryPage, LoginPage, Page, PageCtx, RunsPage, SettingsPage, ToolsPage};

pub const MAIN_MENU: Locator = Locator::id("main-menu");
pub const NAV_LIBRARY: Locator = Locator::id("nav-library");
pub const NAV_RUNS: Locator = Locator::id("nav-runs");
pub const NAV_TOOLS: Locator = Locator::id("nav-tools");
pub const NAV_SETTINGS: Locator = Locator::id("nav-settings");
pub const USER_MENU: Locator = Locator::id("user-menu");
pub const USER_NAME: Locator = Locator::id("user-name");
pub const LOGOUT: Locator = Locator::id("logout-button");
pub const STOP_IMPERSONATION: Locator = Locator::id("stop-impersonation");
pub const IMPERSONATION_BANNER: Locator = Locator::id("impersonation-banner");
pub const NOTIFICATION: Locator = Locator::id("notification");

#[derive(Debug)]
pub struct HomePage<'s> {
    ctx: PageCtx<'s>,
}

super::page!(HomePage, "home", MAIN_MENU);

impl<'s> HomePage<'s> {
    pub(crate) fn from_session(session: &'s Session) -> Self {
        Self::from_ctx(PageCtx::new(session))
    }

    async fn go<P: Page<'s>>(&self, nav: &Locator) -> E2eResult<P> {
        self.session()?.click(nav).await?;
        self.ctx.arrive::<P>().await
    }

    pub async fn library(&self) -> E2eResult<LibraryPage<'s>> {
        self.go(&NAV_LIBRARY).await
    }

    pub async fn runs(&self) -> E2eResult<RunsPage<'s>> {
        self.go(&NAV_RUNS).await
    }

    pub async fn tools(&self) -> E2eResult<ToolsPage<'s>> {
        self.go(&NAV_TOOLS).await
    }

    pub async fn settings(&self) -> E2eResult<SettingsPage<'s>> {
        self.go(&NAV_SETTINGS).await
    }

    /// Login shown in the header
    pub async fn current_user(&self) -> E2eResult<String> {
        self.session()?.current_user().await
    }

    pub async fn is_impersonating(&self) -> E2eResult<bool> {
        self.session()?.is_displayed(&IMPERSONATION_BANNER).await
    }

    /// Wait for a toast containing `text`
    pub async fn ensure_notification(&self, text: &str) -> E2eResult<()> {
        self.expect()?
            .ensure(&NOTIFICATION, &[Condition::ContainsText(text.to_string())])
            .await?;
        Ok(())
    }

    pub async fn logout(self) -> E2eResult<LoginPage<'s>> {
        let session = self.session()?;
        session.logout().await?;
        PageCtx::new(session).arrive::<LoginPage>().await
    }
}
