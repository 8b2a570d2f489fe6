use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use tracing::info;

use pagewalk_common::{ResourceKind, ResourceRef, ScenarioConfig};

use crate::error::E2eResult;
use crate::pages::{RunLogPage, ShellPage};
use crate::runner::{CaseInfo, ScenarioClass, ScenarioContext};
use crate::within::perform_within;

use super::{identity, remembered, start_as, unknown_case};

/// First task of every run; the node is usable once it succeeds
pub const INIT_TASK: &str = "InitializeEnvironment";

/// Launch a tool, use its terminal, pause and resume it, then stop it
#[derive(Debug)]
pub struct RunLifecycle {
    tool: String,
    command: String,
    expected: String,
    run_id: Option<String>,
}

impl RunLifecycle {
    pub fn new(config: &ScenarioConfig) -> Self {
        Self {
            tool: config.run_tool.clone(),
            command: config.ssh_command.clone(),
            expected: config.ssh_expected.clone(),
            run_id: None,
        }
    }

    async fn open<'s>(&self, ctx: &ScenarioContext<'s>) -> E2eResult<RunLogPage<'s>> {
        let id = remembered(&self.run_id, "open run")?;
        ctx.session()
            .home()?
            .runs()
            .await?
            .active()
            .await?
            .open_run(id)
            .await
    }
}

#[async_trait]
impl ScenarioClass for RunLifecycle {
    fn name(&self) -> &str {
        "RunLifecycle"
    }

    fn cases(&self) -> Vec<CaseInfo> {
        vec![
            CaseInfo::new("launch"),
            CaseInfo::new("ssh_command").priority(1).after("launch"),
            CaseInfo::new("pause_resume").priority(2).after("launch"),
            CaseInfo::new("stop").priority(3).after("launch"),
        ]
    }

    async fn setup(&mut self, ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        let admin = identity(ctx.session(), "admin")?;
        start_as(ctx.session(), &admin).await?.tools().await?.ensure_listed(&self.tool).await
    }

    async fn run_case(&mut self, case: &str, ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        match case {
            "launch" => {
                let log = ctx.session().home()?.tools().await?.launch(&self.tool).await?;
                let id = log.run_id().await?;
                ctx.fixture().register(ResourceRef::new(ResourceKind::Run, id.clone()));
                info!("Launched run {}", id);
                self.run_id = Some(id);
                log.wait_for_task(INIT_TASK).await?;
            }
            "ssh_command" => {
                let log = self.open(ctx).await?;
                let (command, expected) = (self.command.as_str(), self.expected.as_str());
                let within: Pin<Box<dyn Future<Output = E2eResult<()>> + Send + '_>> =
                    Box::pin(perform_within::<_, ShellPage, _, _, _>(&log, |shell| async move {
                        shell.execute(command).await?.assert_output_contains(expected).await?;
                        Ok(())
                    }));
                within.await?;
                // back on the run log once the terminal tab is closed
                log.status().await?;
            }
            "pause_resume" => {
                self.open(ctx).await?.pause().await?.resume().await?;
            }
            "stop" => {
                let id = remembered(&self.run_id, case)?;
                self.open(ctx).await?.stop().await?;
                let completed = ctx.session().home()?.runs().await?.completed().await?;
                completed.ensure_listed(id).await?;
            }
            other => return Err(unknown_case(self.name(), other)),
        }
        Ok(())
    }
}
