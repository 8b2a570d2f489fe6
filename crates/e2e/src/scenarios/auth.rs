use async_trait::async_trait;
use tracing::{info, warn};

use pagewalk_common::Identity;

use crate::error::{E2eError, E2eResult};
use crate::runner::{CaseInfo, ScenarioClass, ScenarioContext};
use crate::session::Session;

use super::{identity, start_as, unknown_case};

/// Login, rejected credentials, blocked accounts and impersonation
#[derive(Debug, Default)]
pub struct AuthenticationChecks {
    /// Login currently blocked by this class
    blocked: Option<String>,
}

impl AuthenticationChecks {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Log in as `identity` expecting the console to refuse; returns its reason
async fn expect_refusal(session: &Session, identity: &Identity) -> E2eResult<String> {
    session.open("/").await?;
    match session.login_as(identity).await {
        Err(E2eError::Authentication { reason, .. }) => {
            info!("Login as {} refused: {}", identity, reason);
            Ok(reason)
        }
        Ok(_) => Err(E2eError::StepFailed {
            step: format!("login as {}", identity),
            reason: "console accepted credentials it should refuse".to_string(),
        }),
        Err(e) => Err(e),
    }
}

async fn set_blocked(session: &Session, login: &str, blocked: bool) -> E2eResult<()> {
    let admin = identity(session, "admin")?;
    let tab = start_as(session, &admin)
        .await?
        .settings()
        .await?
        .user_management()
        .await?;
    if blocked {
        tab.block(login).await?;
    } else {
        tab.unblock(login).await?;
    }
    Ok(())
}

#[async_trait]
impl ScenarioClass for AuthenticationChecks {
    fn name(&self) -> &str {
        "AuthenticationChecks"
    }

    fn cases(&self) -> Vec<CaseInfo> {
        vec![
            CaseInfo::new("valid_login"),
            CaseInfo::new("invalid_password").priority(1),
            CaseInfo::new("impersonation").priority(2).after("valid_login"),
            CaseInfo::new("blocked_user").priority(3).after("valid_login"),
        ]
    }

    async fn setup(&mut self, ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        identity(ctx.session(), "admin")?;
        identity(ctx.session(), "user")?;
        Ok(())
    }

    async fn run_case(&mut self, case: &str, ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        let session = ctx.session();
        let user = identity(session, "user")?;

        match case {
            "valid_login" => {
                let home = start_as(session, &user).await?;
                let shown = home.current_user().await?;
                if !user.is(&shown) {
                    return Err(E2eError::Authentication {
                        login: user.login.clone(),
                        reason: format!("header shows '{}'", shown),
                    });
                }
            }
            "invalid_password" => {
                let wrong = Identity::with_password(
                    user.login.clone(),
                    ctx.fixture().unique_name("wrong-password")?,
                );
                expect_refusal(session, &wrong).await?;
            }
            "impersonation" => {
                let admin = identity(session, "admin")?;
                start_as(session, &admin).await?;
                let home = session.impersonate_as(&user).await?;
                if !home.is_impersonating().await? {
                    return Err(E2eError::Impersonation("no impersonation banner".to_string()));
                }
                session.stop_impersonation().await?;
            }
            "blocked_user" => {
                set_blocked(session, &user.login, true).await?;
                self.blocked = Some(user.login.clone());
                expect_refusal(session, &user).await?;
                set_blocked(session, &user.login, false).await?;
                self.blocked = None;
            }
            other => return Err(unknown_case(self.name(), other)),
        }
        Ok(())
    }

    async fn teardown(&mut self, ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        if let Some(login) = self.blocked.take() {
            warn!("Unblocking {} left blocked by a failed case", login);
            set_blocked(ctx.session(), &login, false).await?;
        }
        Ok(())
    }
}
