//! Assertion helpers that turn eventually-consistent UI state into outcomes
//!
//! Every helper here is a specialisation of [`wait_until`]: it picks a
//! budget from [`TimeoutConfig`], a probe, and a failure message.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use pagewalk_common::TimeoutConfig;

use crate::error::{E2eError, E2eResult};
use crate::locator::{describe_states, Condition, ElementState, ExpectationSpec, Locator};
use crate::pages::run_log::{task_locator, TaskStatus, SSH_LINK, TASK_STATUS_ATTR};
use crate::wait::{wait_until, Clock, Probe, WaitPolicy};
use crate::webdriver::Browser;

/// Lines of terminal output quoted in a mismatch message
const OUTPUT_TAIL_LINES: usize = 20;

/// Borrowed view of a browser plus its clock and budgets
#[derive(Clone, Copy)]
pub struct Expect<'a> {
    browser: &'a dyn Browser,
    clock: &'a dyn Clock,
    timeouts: &'a TimeoutConfig,
}

impl<'a> Expect<'a> {
    pub fn new(browser: &'a dyn Browser, clock: &'a dyn Clock, timeouts: &'a TimeoutConfig) -> Self {
        Self {
            browser,
            clock,
            timeouts,
        }
    }

    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy::from_config(self.timeouts)
    }

    pub fn policy_for(&self, timeout: Duration) -> WaitPolicy {
        self.policy().with_timeout(timeout)
    }

    /// Poll until every condition holds for `locator`
    pub async fn ensure(&self, locator: &Locator, conditions: &[Condition]) -> E2eResult<Vec<ElementState>> {
        let spec = ExpectationSpec::new(locator.clone(), conditions.iter().cloned());
        self.ensure_spec(&spec).await
    }

    pub async fn ensure_spec(&self, spec: &ExpectationSpec) -> E2eResult<Vec<ElementState>> {
        let policy = match spec.timeout {
            Some(timeout) => self.policy_for(timeout),
            None => self.policy(),
        };
        let description = spec.description();
        let browser = self.browser;

        wait_until(self.clock, policy, &description, || async move {
            let states = browser.query(&spec.locator).await?;
            if let Some(failed) = spec.conditions.iter().find(|c| !c.holds(&states)) {
                return Ok(Probe::Pending(format!(
                    "{} (unmet: {})",
                    describe_states(&states),
                    failed
                )));
            }
            for condition in &spec.conditions {
                if let Condition::AttributeEquals { name, value } = condition {
                    let actual = browser.attribute(&spec.locator, name).await?;
                    if actual.as_deref() != Some(value.as_str()) {
                        return Ok(Probe::Pending(format!("@{} = {:?}", name, actual)));
                    }
                }
            }
            Ok(Probe::Ready(states))
        })
        .await
    }

    /// Wait for the element to be displayed and enabled
    pub async fn interactable(&self, locator: &Locator) -> E2eResult<ElementState> {
        let description = format!("{} to be interactable", locator);
        let browser = self.browser;
        let result = wait_until(self.clock, self.policy(), &description, || async move {
            let states = browser.query(locator).await?;
            match states.iter().find(|s| s.is_interactable()) {
                Some(state) => Ok(Probe::Ready(state.clone())),
                None => Ok(Probe::Pending(describe_states(&states))),
            }
        })
        .await;

        result.map_err(|e| match e {
            E2eError::AssertionTimeout { last_observed, .. } => E2eError::ElementNotInteractable {
                element: locator.to_string(),
                state: last_observed,
            },
            other => other,
        })
    }

    pub async fn wait_until_text_appears(&self, token: &str) -> E2eResult<()> {
        self.ensure(&Locator::text(token.to_string()), &[Condition::Visible])
            .await
            .map(|_| ())
    }

    /// Wait for a run task to succeed; a failed task ends the wait early
    pub async fn wait_for_task(&self, name: &str) -> E2eResult<()> {
        let locator = task_locator(name);
        let description = format!("task '{}' to succeed", name);
        let browser = self.browser;
        let locator = &locator;

        wait_until(
            self.clock,
            self.policy_for(self.timeouts.task()),
            &description,
            || async move {
                let status = browser.attribute(locator, TASK_STATUS_ATTR).await?;
                match status.as_deref().map(TaskStatus::parse) {
                    Some(TaskStatus::Success) => Ok(Probe::Ready(())),
                    Some(TaskStatus::Failure) => Err(E2eError::StepFailed {
                        step: format!("task {}", name),
                        reason: "task finished with FAILURE".to_string(),
                    }),
                    Some(other) => Ok(Probe::Pending(format!("status {:?}", other))),
                    None => Ok(Probe::Pending("task not listed yet".to_string())),
                }
            },
        )
        .await
    }

    /// Wait for the SSH link of a run and return its address
    pub async fn wait_for_ssh_link(&self) -> E2eResult<String> {
        let browser = self.browser;
        wait_until(
            self.clock,
            self.policy_for(self.timeouts.ssh_link()),
            "SSH link to become available",
            || async move {
                let states = browser.query(&SSH_LINK).await?;
                if !states.iter().any(|s| s.is_interactable()) {
                    return Ok(Probe::Pending(describe_states(&states)));
                }
                match browser.attribute(&SSH_LINK, "href").await? {
                    Some(href) if !href.is_empty() => Ok(Probe::Ready(href)),
                    _ => Ok(Probe::Pending("link without href".to_string())),
                }
            },
        )
        .await
    }

    /// Wait for `file_name` to finish downloading into `dir`; `timeout`
    /// defaults to the download budget
    pub async fn wait_for_download(
        &self,
        dir: &Path,
        file_name: &str,
        timeout: Option<Duration>,
    ) -> E2eResult<PathBuf> {
        let policy = self.policy_for(timeout.unwrap_or_else(|| self.timeouts.download()));
        wait_for_file(self.clock, policy, dir, file_name).await
    }
}

/// Poll the filesystem until `dir/file_name` exists and no partial download
/// marker sits next to it.
pub async fn wait_for_file(clock: &dyn Clock, policy: WaitPolicy, dir: &Path, file_name: &str) -> E2eResult<PathBuf> {
    let target = dir.join(file_name);
    let partials = [
        dir.join(format!("{}.crdownload", file_name)),
        dir.join(format!("{}.part", file_name)),
    ];
    let description = format!("download of {}", target.display());
    let target_ref = &target;
    let partials = &partials;

    wait_until(clock, policy, &description, || async move {
        if partials.iter().any(|p| p.exists()) {
            return Ok(Probe::Pending("download in progress".to_string()));
        }
        if target_ref.is_file() {
            debug!("Download complete: {}", target_ref.display());
            Ok(Probe::Ready(target_ref.clone()))
        } else {
            Ok(Probe::Pending("file not present".to_string()))
        }
    })
    .await
}

/// Terminal text without colour and cursor escape sequences
pub fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Option<Regex>> = OnceLock::new();
    match ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07").ok()) {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Check accumulated terminal output contains `expected`
pub fn assert_output_contains(output: &str, expected: &str) -> E2eResult<()> {
    if output.contains(expected) {
        return Ok(());
    }

    let lines: Vec<&str> = output.lines().collect();
    let tail_start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    let mut message = String::from("expected output to contain:\n");
    for line in expected.lines() {
        message.push_str(&format!("+ {}\n", line));
    }
    message.push_str(&format!(
        "actual output (last {} of {} lines):\n",
        lines.len() - tail_start,
        lines.len()
    ));
    for line in &lines[tail_start..] {
        message.push_str(&format!("- {}\n", line));
    }
    Err(E2eError::OutputMismatch(message))
}
