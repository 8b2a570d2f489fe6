//! pagewalk scenario harness
//!
//! This crate drives a web console through a real browser and provides:
//! - A [`Session`] owning the browser, the acting identity and login flows
//! - Typed page objects whose navigation methods return the next page
//! - Polling assertions that report the last observed state on timeout
//! - Scenario classes run with fixtures that clean up what cases created
//! - Declarative YAML scenarios for simple flows
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ScenarioRunner (per class)                  │
//! │    setup ─► cases by priority/deps ─► teardown ─► Fixture   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page objects                                               │
//! │    LoginPage ─► HomePage ─► LibraryPage ─► StoragePage      │
//! │                         ├─► ToolsPage ─► RunLogPage ─► Shell│
//! │                         ├─► RunsPage                        │
//! │                         └─► SettingsPage ─► UserManagement  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Session ── Expect / wait_until ── Clock                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Browser: WebDriverClient (W3C over HTTP) | MockBrowser     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod expect;
pub mod files;
pub mod fixture;
pub mod locator;
pub mod mock;
pub mod pages;
pub mod runner;
pub mod scenarios;
pub mod session;
pub mod spec;
pub mod steps;
pub mod testing;
pub mod wait;
pub mod webdriver;
pub mod within;

pub use driver::{DriverConfig, DriverHandle};
pub use error::{E2eError, E2eResult};
pub use expect::Expect;
pub use fixture::{Fixture, FixtureState, Janitor, NoopJanitor, TeardownReport, UiJanitor};
pub use locator::{Condition, ExpectationSpec, Locator};
pub use runner::{
    plan_cases, write_results, CaseInfo, CasePlan, CaseStatus, ScenarioClass, ScenarioContext,
    ScenarioRunner, SpecClass, SuiteResult,
};
pub use session::Session;
pub use spec::{TestSpec, TestStep};
pub use wait::{wait_until, Clock, Probe, SystemClock, WaitPolicy};
pub use webdriver::{Browser, TabId, WebDriverClient};
pub use within::{perform_within, Nested};
