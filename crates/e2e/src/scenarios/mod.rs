//! Built-in scenario classes
//!
//! Each class exercises one area of the console end to end through the page
//! objects, and records what it creates in its fixture so the runner can
//! clean up after it.

use pagewalk_common::{Identity, SuiteConfig};

use crate::error::{E2eError, E2eResult};
use crate::pages::HomePage;
use crate::runner::ScenarioClass;
use crate::session::Session;

pub mod auth;
pub mod runs;
pub mod storage;

pub use auth::AuthenticationChecks;
pub use runs::RunLifecycle;
pub use storage::StorageLifecycle;

/// Names accepted by [`builtin`], in suite order
pub const BUILTIN_NAMES: &[&str] = &["authentication", "storage-lifecycle", "run-lifecycle"];

/// Look up a built-in class by name
pub fn builtin(name: &str, config: &SuiteConfig) -> Option<Box<dyn ScenarioClass>> {
    match name {
        "authentication" => Some(Box::new(AuthenticationChecks::new())),
        "storage-lifecycle" => Some(Box::new(StorageLifecycle::new())),
        "run-lifecycle" => Some(Box::new(RunLifecycle::new(&config.scenarios))),
        _ => None,
    }
}

/// Every built-in class
pub fn all(config: &SuiteConfig) -> Vec<Box<dyn ScenarioClass>> {
    BUILTIN_NAMES
        .iter()
        .filter_map(|name| builtin(name, config))
        .collect()
}

/// Configured identity `name`
pub(crate) fn identity(session: &Session, name: &str) -> E2eResult<Identity> {
    Ok(session.config().identity(name)?.clone())
}

/// Home page as `identity`, logging in only when someone else is acting
pub(crate) async fn start_as<'s>(session: &'s Session, identity: &Identity) -> E2eResult<HomePage<'s>> {
    if session.original_identity().is_some() {
        session.stop_impersonation().await?;
    }
    if let Some(current) = session.identity() {
        if current.is(&identity.login) {
            return session.home();
        }
    }
    session.open("/").await?;
    session.login_as(identity).await
}

/// Value remembered by an earlier case
pub(crate) fn remembered<'a>(value: &'a Option<String>, what: &str) -> E2eResult<&'a str> {
    value.as_deref().ok_or_else(|| E2eError::StepFailed {
        step: what.to_string(),
        reason: "not created by an earlier case".to_string(),
    })
}

/// Case name the class does not declare
pub(crate) fn unknown_case(class: &str, case: &str) -> E2eError {
    E2eError::StepFailed {
        step: format!("{}::{}", class, case),
        reason: "no such case".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::console;

    #[test]
    fn test_every_builtin_resolves() {
        let config = console::config();
        for name in BUILTIN_NAMES {
            let class = builtin(name, &config).unwrap();
            assert!(!class.cases().is_empty(), "{name} declares no cases");
        }
        assert!(builtin("nope", &config).is_none());
        assert_eq!(all(&config).len(), BUILTIN_NAMES.len());
    }
}
