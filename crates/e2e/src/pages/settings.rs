//! Settings and user management

use tracing::info;

use crate::error::E2eResult;
use crate::locator::{Condition, Locator};

use super::home::{IMPERSONATION_BANNER, MAIN_MENU};
use super::{confirm_dialog, HomePage, Page, PageCtx};

pub const SETTINGS: Locator = Locator::id("settings");
pub const USERS_TAB: Locator = Locator::id("settings-users");
pub const USER_TABLE: Locator = Locator::id("user-table");
pub const USER_SEARCH: Locator = Locator::id("user-search");
pub const CREATE_USER: Locator = Locator::id("create-user");
pub const NEW_USER_LOGIN: Locator = Locator::id("new-user-login");

/// Set to "true" on the row of a blocked account
pub const BLOCKED_ATTR: &str = "data-blocked";

pub fn user_row(login: &str) -> Locator {
    Locator::keyed("user-row", login)
}

fn user_action(action: &str, login: &str) -> Locator {
    Locator::keyed(&format!("user-{}", action), login)
}

pub struct SettingsPage<'s> {
    ctx: PageCtx<'s>,
}

super::page!(SettingsPage, "settings", SETTINGS);

impl<'s> SettingsPage<'s> {
    pub async fn user_management(self) -> E2eResult<UserManagementTab<'s>> {
        self.session()?.click(&USERS_TAB).await?;
        self.ctx.arrive().await
    }
}

pub struct UserManagementTab<'s> {
    ctx: PageCtx<'s>,
}

super::page!(UserManagementTab, "user management", USER_TABLE);

impl<'s> UserManagementTab<'s> {
    /// Filter the table down to `login`
    pub async fn search(self, login: &str) -> E2eResult<Self> {
        self.session()?.type_into(&USER_SEARCH, login).await?;
        self.expect()?.ensure(&user_row(login), &[Condition::Visible]).await?;
        Ok(self)
    }

    /// Immediate check, no waiting
    pub async fn has_user(&self, login: &str) -> E2eResult<bool> {
        self.session()?.is_displayed(&user_row(login)).await
    }

    /// Start acting as `login`; the console reloads on its home page
    pub async fn impersonate(self, login: &str) -> E2eResult<HomePage<'s>> {
        let tab = self.search(login).await?;
        let session = tab.session()?;
        session.click(&user_action("impersonate", login)).await?;
        confirm_dialog(session).await?;
        session
            .expect()
            .ensure(&IMPERSONATION_BANNER, &[Condition::Visible])
            .await?;
        tab.ctx.arrive::<HomePage>().await
    }

    pub async fn block(self, login: &str) -> E2eResult<Self> {
        info!("Blocking {}", login);
        self.set_blocked(login, "block", true).await
    }

    pub async fn unblock(self, login: &str) -> E2eResult<Self> {
        info!("Unblocking {}", login);
        self.set_blocked(login, "unblock", false).await
    }

    async fn set_blocked(self, login: &str, action: &str, blocked: bool) -> E2eResult<Self> {
        let tab = self.search(login).await?;
        let session = tab.session()?;
        session.click(&user_action(action, login)).await?;
        confirm_dialog(session).await?;
        session
            .expect()
            .ensure(
                &user_row(login),
                &[Condition::AttributeEquals {
                    name: BLOCKED_ATTR.to_string(),
                    value: blocked.to_string(),
                }],
            )
            .await?;
        Ok(tab)
    }

    pub async fn is_blocked(&self, login: &str) -> E2eResult<bool> {
        let value = self
            .session()?
            .browser()
            .attribute(&user_row(login), BLOCKED_ATTR)
            .await?;
        Ok(value.as_deref() == Some("true"))
    }

    pub async fn create_user(self, login: &str) -> E2eResult<Self> {
        info!("Creating user {}", login);
        let session = self.session()?;
        session.click(&CREATE_USER).await?;
        session.type_into(&NEW_USER_LOGIN, login).await?;
        confirm_dialog(session).await?;
        self.search(login).await
    }

    pub async fn delete_user(self, login: &str) -> E2eResult<Self> {
        info!("Deleting user {}", login);
        let tab = self.search(login).await?;
        let session = tab.session()?;
        session.click(&user_action("delete", login)).await?;
        confirm_dialog(session).await?;
        session
            .expect()
            .ensure(&user_row(login), &[Condition::Absent])
            .await?;
        Ok(tab)
    }

    /// Leave settings for the home page
    pub async fn home(self) -> E2eResult<HomePage<'s>> {
        self.expect()?.ensure(&MAIN_MENU, &[Condition::Visible]).await?;
        Ok(HomePage::from_ctx(self.ctx))
    }
}
