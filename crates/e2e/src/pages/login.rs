use pagewalk_common::Identity;

use crate::error::E2eResult;
use crate::locator::Locator;

use super::{HomePage, Page, PageCtx};

pub const LOGIN_FORM: Locator = Locator::id("login-form");
pub const USERNAME: Locator = Locator::id("login-username");
pub const PASSWORD: Locator = Locator::id("login-password");
pub const SUBMIT: Locator = Locator::id("login-submit");
/// Shown instead of the home page when credentials are rejected
pub const AUTH_ERROR: Locator = Locator::id("auth-error");

pub struct LoginPage<'s> {
    ctx: PageCtx<'s>,
}

super::page!(LoginPage, "login", LOGIN_FORM);

impl<'s> LoginPage<'s> {
    pub async fn fill_username(self, login: &str) -> E2eResult<Self> {
        self.session()?.type_into(&USERNAME, login).await?;
        Ok(self)
    }

    pub async fn fill_password(self, password: &str) -> E2eResult<Self> {
        self.session()?.type_into(&PASSWORD, password).await?;
        Ok(self)
    }

    /// Submit and land on the home page as `identity`
    pub async fn submit_as(self, identity: &Identity) -> E2eResult<HomePage<'s>> {
        let session = self.session()?;
        session.click(&SUBMIT).await?;
        session.finish_login(identity).await
    }

    /// Submit credentials expected to be refused; returns the error shown
    pub async fn submit_expecting_error(self) -> E2eResult<String> {
        let session = self.session()?;
        session.click(&SUBMIT).await?;
        Ok(session.text_of(&AUTH_ERROR).await?.trim().to_string())
    }
}
