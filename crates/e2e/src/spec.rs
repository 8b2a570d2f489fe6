//! Declarative YAML scenario specifications

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::locator::{Condition, Locator};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Lower runs first
    #[serde(default)]
    pub priority: i32,

    /// Scenarios that must pass before this one runs
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Identity (by config name) to log in as before the first step
    #[serde(default)]
    pub login_as: Option<String>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

/// Screen reachable from the main menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Library,
    Runs,
    Tools,
    Settings,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Load an address (relative to the base url)
    Open {
        #[serde(default)]
        path: String,
    },

    /// Log in as a configured identity
    Login { identity: String },

    Logout,

    /// Follow the main menu
    Navigate { to: Destination },

    Click {
        element: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Replace the content of an input
    Fill { element: Locator, value: String },

    Select { element: Locator, value: String },

    /// Poll until every condition holds
    Ensure {
        element: Locator,
        conditions: Vec<Condition>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    WaitText {
        text: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    Refresh,

    /// Upload a generated file through a file input
    Upload {
        element: Locator,
        file_name: String,
        #[serde(default)]
        contents: String,
    },

    /// Wait for a file to finish downloading into the download directory
    WaitDownload {
        file_name: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    Screenshot { name: String },

    /// Log a message (for debugging)
    Log { message: String },
}

impl TestSpec {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load every `.yaml`/`.yml` scenario below `dir`, in path order
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                E2eError::SpecParse(format!("cannot read scenarios in {}: {}", dir.display(), e))
            })?;
            let is_yaml = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if !is_yaml || !entry.file_type().is_file() {
                continue;
            }
            debug!("Loading scenario {}", entry.path().display());
            specs.push(Self::from_file(entry.path())?);
        }

        let mut names = std::collections::HashSet::new();
        for spec in &specs {
            if !names.insert(spec.name.as_str()) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate scenario name '{}' in {}",
                    spec.name,
                    dir.display()
                )));
            }
        }

        Ok(specs)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("scenario '{}' has no steps", self.name)));
        }
        if self.depends_on.contains(&self.name) {
            return Err(E2eError::SpecParse(format!("scenario '{}' depends on itself", self.name)));
        }
        Ok(())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.has_tag(tag)).collect()
    }

    /// Filter specs whose name contains `pattern`
    pub fn filter_by_name<'a>(specs: &'a [Self], pattern: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.name.contains(pattern)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_spec() {
        let yaml = r#"
name: storage-smoke
description: Storage page lists the upload
tags: [storage, smoke]
priority: 2
login_as: admin
steps:
  - action: navigate
    to: library
  - action: click
    element: { test_id: library-item-demo }
  - action: ensure
    element: { test_id: storage-browser }
    conditions: [visible]
    timeout_ms: 5000
  - action: upload
    element: { test_id: storage-upload-input }
    file_name: hello.txt
    contents: hello
  - action: wait_text
    text: hello.txt
  - action: screenshot
    name: storage-with-file
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "storage-smoke");
        assert_eq!(spec.priority, 2);
        assert_eq!(spec.login_as.as_deref(), Some("admin"));
        assert_eq!(spec.steps.len(), 6);
        assert_eq!(spec.steps[0], TestStep::Navigate { to: Destination::Library });
        match &spec.steps[2] {
            TestStep::Ensure { element, conditions, timeout_ms } => {
                assert_eq!(element, &Locator::id("storage-browser"));
                assert_eq!(conditions, &vec![Condition::Visible]);
                assert_eq!(*timeout_ms, Some(5000));
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_parse_unit_steps() {
        let yaml = r#"
name: relogin
depends_on: [storage-smoke]
steps:
  - action: open
  - action: logout
  - action: refresh
  - action: login
    identity: user
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.steps[0], TestStep::Open { path: String::new() });
        assert_eq!(spec.steps[1], TestStep::Logout);
        assert_eq!(spec.depends_on, vec!["storage-smoke".to_string()]);
    }

    #[test]
    fn test_rejects_empty_and_self_dependent_specs() {
        assert!(TestSpec::from_yaml("name: empty\nsteps: []\n").is_err());
        let err = TestSpec::from_yaml(
            "name: loop\ndepends_on: [loop]\nsteps:\n  - action: refresh\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("depends on itself"));
    }

    #[test]
    fn test_unknown_action_is_an_error() {
        let yaml = "name: x\nsteps:\n  - action: teleport\n";
        assert!(TestSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_all_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "name: alpha\ntags: [smoke]\nsteps:\n  - action: refresh\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("nested/b.yml"),
            "name: beta\nsteps:\n  - action: refresh\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let specs = TestSpec::load_all(dir.path()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(TestSpec::filter_by_tag(&specs, "smoke").len(), 1);
        assert_eq!(TestSpec::filter_by_name(&specs, "bet")[0].name, "beta");
    }

    #[test]
    fn test_load_all_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TestSpec::load_all(&dir.path().join("scenarios")).unwrap_err();
        assert!(matches!(err, E2eError::SpecParse(_)));
        assert!(err.to_string().contains("scenarios"));
    }

    #[test]
    fn test_parse_wait_download() {
        let yaml = "name: export
steps:
  - action: wait_download
    file_name: report.csv
";
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(
            spec.steps[0],
            TestStep::WaitDownload {
                file_name: "report.csv".to_string(),
                timeout_ms: None
            }
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["a.yaml", "b.yaml"] {
            std::fs::write(dir.path().join(file), "name: same\nsteps:\n  - action: refresh\n").unwrap();
        }
        let err = TestSpec::load_all(dir.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
