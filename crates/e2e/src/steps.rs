//! Executes declarative steps against a [`Session`]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::E2eResult;
use crate::files::TempUpload;
use crate::locator::{Condition, ExpectationSpec, Locator};
use crate::session::Session;
use crate::spec::{Destination, TestStep};

/// Result of executing a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Execute a single step; failures are reported in the result
pub async fn execute_step(session: &Session, step: &TestStep) -> StepResult {
    let start = Instant::now();
    let step_name = step_name(step);

    debug!("Executing step: {}", step_name);
    let result = run_step(session, step).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(screenshot_path) => StepResult {
            success: true,
            step_name,
            duration_ms,
            error: None,
            screenshot_path,
        },
        Err(e) => StepResult {
            success: false,
            step_name,
            duration_ms,
            error: Some(e.to_string()),
            screenshot_path: None,
        },
    }
}

async fn run_step(session: &Session, step: &TestStep) -> E2eResult<Option<PathBuf>> {
    match step {
        TestStep::Open { path } => session.open(path).await?,
        TestStep::Login { identity } => {
            let identity = session.config().identity(identity)?.clone();
            session.login_as(&identity).await?;
        }
        TestStep::Logout => session.logout().await?,
        TestStep::Navigate { to } => {
            let home = session.home()?;
            match to {
                Destination::Library => drop(home.library().await?),
                Destination::Runs => drop(home.runs().await?),
                Destination::Tools => drop(home.tools().await?),
                Destination::Settings => drop(home.settings().await?),
            }
        }
        TestStep::Click { element, timeout_ms } => {
            if let Some(ms) = timeout_ms {
                ensure(session, element, &[Condition::Visible, Condition::Enabled], Some(*ms)).await?;
            }
            session.click(element).await?;
        }
        TestStep::Fill { element, value } => session.type_into(element, value).await?,
        TestStep::Select { element, value } => session.select(element, value).await?,
        TestStep::Ensure {
            element,
            conditions,
            timeout_ms,
        } => ensure(session, element, conditions, *timeout_ms).await?,
        TestStep::WaitText { text, timeout_ms } => {
            ensure(session, &Locator::text(text.clone()), &[Condition::Visible], *timeout_ms).await?
        }
        TestStep::Refresh => session.refresh().await?,
        TestStep::Upload {
            element,
            file_name,
            contents,
        } => {
            let upload = TempUpload::new(file_name, contents.as_bytes())?;
            session.upload(element, upload.path()).await?;
        }
        TestStep::WaitDownload { file_name, timeout_ms } => {
            let dir = &session.config().browser.download_dir;
            let path = session
                .expect()
                .wait_for_download(dir, file_name, timeout_ms.map(Duration::from_millis))
                .await?;
            info!("Downloaded {}", path.display());
        }
        TestStep::Screenshot { name } => {
            let dir = session.config().artifacts.screenshot_dir();
            return Ok(Some(session.screenshot_to(&dir, name).await?));
        }
        TestStep::Log { message } => info!("[SCENARIO LOG] {}", message),
    }
    Ok(None)
}

async fn ensure(
    session: &Session,
    element: &Locator,
    conditions: &[Condition],
    timeout_ms: Option<u64>,
) -> E2eResult<()> {
    let mut spec = ExpectationSpec::new(element.clone(), conditions.iter().cloned());
    if let Some(ms) = timeout_ms {
        spec = spec.within(Duration::from_millis(ms));
    }
    session.expect().ensure_spec(&spec).await?;
    Ok(())
}

/// Short label for logs and reports
pub fn step_name(step: &TestStep) -> String {
    match step {
        TestStep::Open { path } => format!("open:{}", if path.is_empty() { "/" } else { path }),
        TestStep::Login { identity } => format!("login:{}", identity),
        TestStep::Logout => "logout".to_string(),
        TestStep::Navigate { to } => format!("navigate:{:?}", to).to_lowercase(),
        TestStep::Click { element, .. } => format!("click:{}", element),
        TestStep::Fill { element, .. } => format!("fill:{}", element),
        TestStep::Select { element, .. } => format!("select:{}", element),
        TestStep::Ensure { element, .. } => format!("ensure:{}", element),
        TestStep::WaitText { text, .. } => format!("wait_text:{}", text),
        TestStep::Refresh => "refresh".to_string(),
        TestStep::Upload { file_name, .. } => format!("upload:{}", file_name),
        TestStep::WaitDownload { file_name, .. } => format!("wait_download:{}", file_name),
        TestStep::Screenshot { name } => format!("screenshot:{}", name),
        TestStep::Log { message } => format!("log:{}", message.chars().take(30).collect::<String>()),
    }
}
