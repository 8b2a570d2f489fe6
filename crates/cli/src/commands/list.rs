//! List Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use pagewalk_common::SuiteConfig;
use pagewalk_e2e::scenarios::{self, BUILTIN_NAMES};

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Also list YAML scenarios below this directory
    #[arg(long, value_name = "DIR")]
    specs: Option<PathBuf>,

    /// Only YAML scenarios carrying this tag
    #[arg(short, long)]
    tag: Option<String>,
}

/// A runnable scenario: a built-in class or a YAML file
#[derive(Debug, Serialize)]
pub struct ScenarioRow {
    pub name: String,
    pub source: String,
    pub cases: Vec<String>,
    pub tags: Vec<String>,
    pub depends_on: Vec<String>,
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["NAME", "SOURCE", "CASES", "TAGS", "DEPENDS ON"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.source.clone(),
            self.cases.join(", "),
            self.tags.join(", "),
            self.depends_on.join(", "),
        ]
    }
}

/// Built-in classes, with their cases in run order
pub fn builtin_rows(config: &SuiteConfig) -> Vec<ScenarioRow> {
    BUILTIN_NAMES
        .iter()
        .filter_map(|name| scenarios::builtin(name, config).map(|class| (name, class)))
        .map(|(name, class)| ScenarioRow {
            name: name.to_string(),
            source: format!("builtin ({})", class.name()),
            cases: pagewalk_e2e::runner::order_cases(class.cases())
                .into_iter()
                .map(|c| c.name)
                .collect(),
            tags: Vec::new(),
            depends_on: Vec::new(),
        })
        .collect()
}

pub fn execute(args: ListArgs, config: &SuiteConfig, format: OutputFormat) -> Result<()> {
    let mut rows = if args.tag.is_none() {
        builtin_rows(config)
    } else {
        Vec::new()
    };

    if let Some(dir) = &args.specs {
        for spec in super::load_specs(dir, args.tag.as_deref(), None)? {
            rows.push(ScenarioRow {
                source: dir.display().to_string(),
                cases: vec![format!("{} step(s)", spec.steps.len())],
                tags: spec.tags,
                depends_on: spec.depends_on,
                name: spec.name,
            });
        }
    }

    print_list(&rows, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rows_list_cases_in_order() {
        let rows = builtin_rows(&SuiteConfig::default());
        assert_eq!(rows.len(), BUILTIN_NAMES.len());

        let storage = rows.iter().find(|r| r.name == "storage-lifecycle").unwrap();
        assert_eq!(storage.cases.first().map(String::as_str), Some("create_storage"));
        assert_eq!(storage.cases.last().map(String::as_str), Some("delete_storage"));
    }
}
