//! pagewalk CLI
//!
//! Command-line front end running scenario classes and YAML scenarios
//! against a web console.

pub mod commands;
pub mod output;
