//! Scripted console for exercising page objects and scenarios offline
//!
//! [`MockConsole`] attaches reactions to a [`MockBrowser`] so that it behaves
//! like the console under test: login form and token cookie, main menu,
//! library with storages and folders, tools and runs, the run terminal and
//! user management with impersonation. Every interaction re-renders the
//! current screen from a small in-memory model.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use pagewalk_common::{Identity, SuiteConfig};

use crate::locator::Locator;
use crate::mock::{MockBrowser, MockDom, MockElement};
use crate::pages::run_log::{self, RunStatus, TASK_STATUS_ATTR};
use crate::pages::settings::{self, BLOCKED_ATTR};
use crate::pages::{home, library, login, runs, shell, storage, tools, DIALOG, DIALOG_CANCEL, DIALOG_OK};

/// Fixed values of the scripted console
pub mod console {
    use super::*;

    pub const BASE_URL: &str = "http://console.test";
    pub const ADMIN_PASSWORD: &str = "admin-pass";
    pub const USER_PASSWORD: &str = "user-pass";
    pub const ADMIN_TOKEN: &str = "admin-token";
    /// Tool every console starts with
    pub const TOOL: &str = "ubuntu";
    /// Task every run completes after a couple of polls
    pub const INIT_TASK: &str = "InitializeEnvironment";
    pub const SESSION_COOKIE: &str = "console-session";

    /// Suite configuration pointing at the scripted console
    pub fn config() -> SuiteConfig {
        let mut config = SuiteConfig::default();
        config.base_url = BASE_URL.to_string();
        config.identities.insert("admin".to_string(), admin());
        config.identities.insert("user".to_string(), user());
        config.scenarios.run_tool = TOOL.to_string();
        config
    }
}

pub fn admin() -> Identity {
    Identity::with_password("admin", console::ADMIN_PASSWORD)
}

pub fn user() -> Identity {
    Identity::with_password("user", console::USER_PASSWORD)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Screen {
    Login,
    Home,
    Library,
    Storage(String),
    Tools,
    RunLog(String),
    Shell(String),
    Runs { completed: bool },
    Settings,
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunAction {
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserAction {
    Impersonate,
    Block,
    Unblock,
    Delete,
}

#[derive(Debug, Clone)]
enum Dialog {
    CreateStorage,
    CreateFolder,
    DeleteItem(String),
    RenameFile(String),
    DeleteFile(String),
    StorageSettings { confirm_delete: bool },
    Launch(String),
    DeleteTool(String),
    Run(RunAction, String),
    CreateUser,
    User(UserAction, String),
}

#[derive(Debug, Clone)]
struct Account {
    login: String,
    password: String,
    token: Option<String>,
    blocked: bool,
}

#[derive(Debug, Clone, Default)]
struct StorageModel {
    files: Vec<String>,
    description: String,
}

#[derive(Debug, Clone)]
struct RunModel {
    tool: String,
    status: RunStatus,
}

#[derive(Debug)]
struct ConsoleModel {
    /// Keyed by lower-cased login
    accounts: BTreeMap<String, Account>,
    storages: BTreeMap<String, StorageModel>,
    folders: BTreeSet<String>,
    tools: BTreeSet<String>,
    runs: BTreeMap<String, RunModel>,
    next_run: u64,
    acting: Option<String>,
    impersonator: Option<String>,
    screen: Screen,
    return_screen: Option<Screen>,
    dialog: Option<Dialog>,
    create_menu: bool,
    selected_tool: Option<String>,
    user_filter: String,
    auth_error: Option<String>,
    notification: Option<String>,
    terminal: String,
    reject_uploads: bool,
}

impl ConsoleModel {
    fn new() -> Self {
        let mut accounts = BTreeMap::new();
        for (login, password, token) in [
            ("admin", console::ADMIN_PASSWORD, Some(console::ADMIN_TOKEN)),
            ("user", console::USER_PASSWORD, None),
        ] {
            accounts.insert(
                login.to_string(),
                Account {
                    login: login.to_string(),
                    password: password.to_string(),
                    token: token.map(str::to_string),
                    blocked: false,
                },
            );
        }
        Self {
            accounts,
            storages: BTreeMap::new(),
            folders: BTreeSet::new(),
            tools: BTreeSet::from([console::TOOL.to_string()]),
            runs: BTreeMap::new(),
            next_run: 1001,
            acting: None,
            impersonator: None,
            screen: Screen::Login,
            return_screen: None,
            dialog: None,
            create_menu: false,
            selected_tool: None,
            user_filter: String::new(),
            auth_error: None,
            notification: None,
            terminal: String::new(),
            reject_uploads: false,
        }
    }

    fn account(&self, login: &str) -> Option<&Account> {
        self.accounts.get(&login.to_ascii_lowercase())
    }

    fn account_mut(&mut self, login: &str) -> Option<&mut Account> {
        self.accounts.get_mut(&login.to_ascii_lowercase())
    }

    /// Forget any transient UI state, as loading a new screen does
    fn reset_view(&mut self) {
        self.dialog = None;
        self.create_menu = false;
        self.selected_tool = None;
        self.notification = None;
    }

    fn go(&mut self, screen: Screen) {
        self.reset_view();
        self.screen = screen;
    }

    fn navigate(&mut self, dom: &mut MockDom, url: &str) {
        self.reset_view();
        self.auth_error = None;

        let token = dom.cookies.get("bearer").cloned();
        if let Some(token) = token {
            let holder = self
                .accounts
                .values()
                .find(|a| !a.blocked && a.token.as_deref() == Some(token.as_str()))
                .map(|a| a.login.clone());
            if let Some(login) = holder {
                dom.cookies.insert(console::SESSION_COOKIE.to_string(), login.clone());
                self.acting = Some(login);
            }
        }
        match dom.cookies.get(console::SESSION_COOKIE) {
            Some(login) if self.acting.is_none() => self.acting = Some(login.clone()),
            Some(_) => {}
            None => {
                self.acting = None;
                self.impersonator = None;
            }
        }

        let path = url.strip_prefix(console::BASE_URL).unwrap_or(url);
        self.screen = if self.acting.is_none() {
            Screen::Login
        } else if let Some(id) = path.strip_prefix("/ssh/") {
            self.return_screen = Some(self.screen.clone());
            self.terminal.clear();
            Screen::Shell(id.to_string())
        } else if let Some(id) = path.strip_prefix("/runs/") {
            Screen::RunLog(id.to_string())
        } else {
            Screen::Home
        };
    }

    fn submit_login(&mut self, dom: &mut MockDom) {
        let login = dom.value(&login::USERNAME).unwrap_or_default();
        let password = dom.value(&login::PASSWORD).unwrap_or_default();
        let outcome = match self.account(login.trim()) {
            Some(account) if account.password != password => Err("Invalid credentials"),
            Some(account) if account.blocked => Err("User is blocked"),
            Some(account) => Ok(account.login.clone()),
            None => Err("Invalid credentials"),
        };
        match outcome {
            Ok(login) => {
                dom.cookies.insert(console::SESSION_COOKIE.to_string(), login.clone());
                self.acting = Some(login);
                self.auth_error = None;
                self.go(Screen::Home);
            }
            Err(reason) => self.auth_error = Some(reason.to_string()),
        }
    }

    fn click(&mut self, dom: &mut MockDom, id: &str) {
        match id {
            "login-submit" => self.submit_login(dom),
            "logout-button" => {
                dom.cookies.remove(console::SESSION_COOKIE);
                dom.cookies.remove("bearer");
                self.acting = None;
                self.impersonator = None;
                self.go(Screen::Login);
            }
            "stop-impersonation" => {
                if let Some(original) = self.impersonator.take() {
                    self.acting = Some(original);
                    self.go(Screen::Home);
                }
            }
            "nav-library" => self.go(Screen::Library),
            "nav-runs" | "runs-active" => self.go(Screen::Runs { completed: false }),
            "runs-completed" => self.go(Screen::Runs { completed: true }),
            "nav-tools" => self.go(Screen::Tools),
            "nav-settings" => self.go(Screen::Settings),
            "settings-users" => {
                self.user_filter.clear();
                self.go(Screen::Users);
            }
            "library-create" => self.create_menu = true,
            "create-storage" => {
                self.create_menu = false;
                self.dialog = Some(Dialog::CreateStorage);
            }
            "create-folder" => {
                self.create_menu = false;
                self.dialog = Some(Dialog::CreateFolder);
            }
            "dialog-ok" => self.confirm(dom),
            "dialog-cancel" | "dialog-close" => self.dialog = None,
            "storage-settings" => self.dialog = Some(Dialog::StorageSettings { confirm_delete: false }),
            "storage-delete" => {
                if let Some(Dialog::StorageSettings { .. }) = self.dialog {
                    self.dialog = Some(Dialog::StorageSettings { confirm_delete: true });
                }
            }
            "storage-delete-confirm" => {
                if let Screen::Storage(name) = self.screen.clone() {
                    self.storages.remove(&name);
                    self.go(Screen::Library);
                    self.notification = Some(format!("Storage {} deleted", name));
                }
            }
            "tool-run" => {
                if let Some(tool) = self.selected_tool.clone() {
                    self.dialog = Some(Dialog::Launch(tool));
                }
            }
            "launch-confirm" => self.confirm(dom),
            "run-pause" | "run-resume" | "run-stop" => {
                if let Screen::RunLog(run) = &self.screen {
                    let action = match id {
                        "run-pause" => RunAction::Pause,
                        "run-resume" => RunAction::Resume,
                        _ => RunAction::Stop,
                    };
                    self.dialog = Some(Dialog::Run(action, run.clone()));
                }
            }
            "create-user" => self.dialog = Some(Dialog::CreateUser),
            _ => self.click_keyed(id),
        }
    }

    fn click_keyed(&mut self, id: &str) {
        if let Some(name) = id.strip_prefix("library-item-delete-") {
            self.dialog = Some(Dialog::DeleteItem(name.to_string()));
        } else if let Some(name) = id.strip_prefix("library-item-") {
            if self.storages.contains_key(name) {
                self.go(Screen::Storage(name.to_string()));
            }
        } else if let Some(name) = id.strip_prefix("file-rename-") {
            self.dialog = Some(Dialog::RenameFile(name.to_string()));
        } else if let Some(name) = id.strip_prefix("file-delete-") {
            self.dialog = Some(Dialog::DeleteFile(name.to_string()));
        } else if let Some(name) = id.strip_prefix("tool-delete-") {
            self.dialog = Some(Dialog::DeleteTool(name.to_string()));
        } else if let Some(name) = id.strip_prefix("tool-") {
            if self.tools.contains(name) {
                self.selected_tool = Some(name.to_string());
            }
        } else if let Some(run) = id.strip_prefix("run-stop-") {
            self.dialog = Some(Dialog::Run(RunAction::Stop, run.to_string()));
        } else if let Some(run) = id.strip_prefix("run-row-") {
            self.go(Screen::RunLog(run.to_string()));
        } else if let Some(rest) = id.strip_prefix("user-") {
            let actions = [
                ("impersonate-", UserAction::Impersonate),
                ("unblock-", UserAction::Unblock),
                ("block-", UserAction::Block),
                ("delete-", UserAction::Delete),
            ];
            for (prefix, action) in actions {
                if let Some(login) = rest.strip_prefix(prefix) {
                    self.dialog = Some(Dialog::User(action, login.to_string()));
                    break;
                }
            }
        }
    }

    /// Apply the open dialog
    fn confirm(&mut self, dom: &mut MockDom) {
        let Some(dialog) = self.dialog.take() else {
            return;
        };
        match dialog {
            Dialog::CreateStorage => {
                if let Some(name) = entered_name(dom) {
                    self.storages.insert(name.clone(), StorageModel::default());
                    self.notification = Some(format!("Storage {} created", name));
                }
            }
            Dialog::CreateFolder => {
                if let Some(name) = entered_name(dom) {
                    self.folders.insert(name);
                }
            }
            Dialog::DeleteItem(name) => {
                self.folders.remove(&name);
                self.storages.remove(&name);
            }
            Dialog::RenameFile(from) => {
                let to = dom.value(&storage::RENAME_INPUT).unwrap_or_default().trim().to_string();
                if let Some(model) = self.current_storage_mut() {
                    for file in model.files.iter_mut().filter(|f| **f == from) {
                        *file = to.clone();
                    }
                }
            }
            Dialog::DeleteFile(name) => {
                if let Some(model) = self.current_storage_mut() {
                    model.files.retain(|f| *f != name);
                }
            }
            Dialog::StorageSettings { .. } => {
                let description = dom.value(&storage::DESCRIPTION).unwrap_or_default();
                if let Some(model) = self.current_storage_mut() {
                    model.description = description;
                }
            }
            Dialog::Launch(tool) => {
                let id = self.next_run.to_string();
                self.next_run += 1;
                self.runs.insert(
                    id.clone(),
                    RunModel {
                        tool,
                        status: RunStatus::Running,
                    },
                );
                self.go(Screen::RunLog(id));
            }
            Dialog::DeleteTool(name) => {
                self.tools.remove(&name);
            }
            Dialog::Run(action, id) => {
                if let Some(run) = self.runs.get_mut(&id) {
                    run.status = match action {
                        RunAction::Pause => RunStatus::Paused,
                        RunAction::Resume => RunStatus::Running,
                        RunAction::Stop => RunStatus::Stopped,
                    };
                }
            }
            Dialog::CreateUser => {
                let login = dom.value(&settings::NEW_USER_LOGIN).unwrap_or_default().trim().to_string();
                if !login.is_empty() {
                    self.accounts.insert(
                        login.to_ascii_lowercase(),
                        Account {
                            password: format!("{}-pass", login),
                            login,
                            token: None,
                            blocked: false,
                        },
                    );
                }
            }
            Dialog::User(action, login) => match action {
                UserAction::Impersonate => {
                    let target = self.account(&login).map(|a| a.login.clone());
                    if let Some(target) = target {
                        self.impersonator = self.acting.take();
                        self.acting = Some(target);
                        self.go(Screen::Home);
                    }
                }
                UserAction::Block | UserAction::Unblock => {
                    if let Some(account) = self.account_mut(&login) {
                        account.blocked = action == UserAction::Block;
                    }
                }
                UserAction::Delete => {
                    self.accounts.remove(&login.to_ascii_lowercase());
                }
            },
        }
    }

    fn current_storage_mut(&mut self) -> Option<&mut StorageModel> {
        match &self.screen {
            Screen::Storage(name) => self.storages.get_mut(name),
            _ => None,
        }
    }

    /// React to typed input; returns whether the screen changed
    fn keys(&mut self, dom: &mut MockDom, id: &str) -> bool {
        match id {
            "user-search" => {
                self.user_filter = dom.value(&settings::USER_SEARCH).unwrap_or_default();
                true
            }
            "storage-upload-input" if self.reject_uploads => false,
            "storage-upload-input" => {
                let value = dom.value(&storage::UPLOAD_INPUT).unwrap_or_default();
                let name = Path::new(&value)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string());
                match (name, self.current_storage_mut()) {
                    (Some(name), Some(model)) => {
                        model.files.retain(|f| *f != name);
                        model.files.push(name);
                        true
                    }
                    _ => false,
                }
            }
            "terminal-input" => {
                let value = dom.value(&shell::TERMINAL_INPUT).unwrap_or_default();
                let Some((command, _)) = value.split_once('\n') else {
                    return false;
                };
                let output = self.execute(command.trim());
                self.terminal.push_str(&format!("$ {}\n{}\n", command.trim(), output));
                true
            }
            _ => false,
        }
    }

    fn execute(&self, command: &str) -> String {
        let host = match &self.screen {
            Screen::Shell(id) => format!("pipeline-{}", id),
            _ => "localhost".to_string(),
        };
        match command.split_once(' ') {
            Some(("echo", rest)) => rest.trim_matches('"').to_string(),
            _ if command == "hostname" => host,
            _ if command == "whoami" => "root".to_string(),
            _ => format!("{}: command not found", command),
        }
    }

    fn switch_back(&mut self) {
        if let (Screen::Shell(_), Some(screen)) = (&self.screen, self.return_screen.take()) {
            self.go(screen);
        }
    }

    fn render(&self, dom: &mut MockDom) {
        dom.clear();

        let Some(acting) = &self.acting else {
            dom.add(MockElement::new(login::LOGIN_FORM));
            dom.add(MockElement::input(login::USERNAME));
            dom.add(MockElement::input(login::PASSWORD));
            dom.add(MockElement::new(login::SUBMIT).text("Sign in"));
            if let Some(reason) = &self.auth_error {
                dom.add(MockElement::new(login::AUTH_ERROR).text(reason.clone()));
            }
            return;
        };

        if let Screen::Shell(_) = self.screen {
            dom.add(MockElement::new(shell::TERMINAL));
            dom.add(MockElement::input(shell::TERMINAL_INPUT));
            dom.add(MockElement::new(shell::TERMINAL_OUTPUT).text(self.terminal.clone()));
            return;
        }

        for chrome in [
            home::MAIN_MENU,
            home::NAV_LIBRARY,
            home::NAV_RUNS,
            home::NAV_TOOLS,
            home::NAV_SETTINGS,
            home::USER_MENU,
            home::LOGOUT,
        ] {
            dom.add(MockElement::new(chrome));
        }
        dom.add(MockElement::new(home::USER_NAME).text(acting.clone()));
        if let Some(original) = &self.impersonator {
            dom.add(
                MockElement::new(home::IMPERSONATION_BANNER)
                    .text(format!("{} is acting as {}", original, acting)),
            );
            dom.add(MockElement::new(home::STOP_IMPERSONATION));
        }
        if let Some(text) = &self.notification {
            dom.add(MockElement::new(home::NOTIFICATION).text(text.clone()));
        }

        match &self.screen {
            Screen::Login | Screen::Home | Screen::Shell(_) => {}
            Screen::Library => self.render_library(dom),
            Screen::Storage(name) => self.render_storage(dom, name),
            Screen::Tools => {
                dom.add(MockElement::new(tools::TOOLS_LIST));
                for tool in &self.tools {
                    dom.add(MockElement::new(tools::tool(tool)).text(tool.clone()));
                    dom.add(MockElement::new(tools::tool_delete(tool)));
                }
                if self.selected_tool.is_some() {
                    dom.add(MockElement::new(tools::TOOL_RUN));
                }
            }
            Screen::RunLog(id) => self.render_run(dom, id),
            Screen::Runs { completed } => {
                dom.add(MockElement::new(runs::RUNS_TABLE));
                dom.add(MockElement::new(runs::ACTIVE_TAB));
                dom.add(MockElement::new(runs::COMPLETED_TAB));
                for (id, run) in self.runs.iter().filter(|(_, r)| r.status.is_final() == *completed) {
                    dom.add(
                        MockElement::new(runs::run_row(id))
                            .text(run.tool.clone())
                            .attr(TASK_STATUS_ATTR, run.status.as_str()),
                    );
                    if !completed {
                        dom.add(MockElement::new(runs::run_stop(id)));
                    }
                }
            }
            Screen::Settings => {
                dom.add(MockElement::new(settings::SETTINGS));
                dom.add(MockElement::new(settings::USERS_TAB));
            }
            Screen::Users => self.render_users(dom),
        }

        self.render_dialog(dom);
    }

    fn render_library(&self, dom: &mut MockDom) {
        dom.add(MockElement::new(library::LIBRARY_TREE));
        dom.add(MockElement::new(library::CREATE));
        if self.create_menu {
            dom.add(MockElement::new(library::CREATE_STORAGE));
            dom.add(MockElement::new(library::CREATE_FOLDER));
        }
        for name in self.storages.keys() {
            dom.add(MockElement::new(library::item(name)).text(name.clone()));
        }
        for name in &self.folders {
            dom.add(MockElement::new(library::item(name)).text(name.clone()));
            dom.add(MockElement::new(library::item_delete(name)));
        }
    }

    fn render_storage(&self, dom: &mut MockDom, name: &str) {
        let Some(model) = self.storages.get(name) else {
            return self.render_library(dom);
        };
        dom.add(MockElement::new(storage::STORAGE_BROWSER));
        dom.add(MockElement::new(storage::TITLE).text(name.to_string()));
        dom.add(MockElement::input(storage::UPLOAD_INPUT).hidden());
        dom.add(MockElement::new(storage::REFRESH));
        dom.add(MockElement::new(storage::SETTINGS));
        for file in &model.files {
            dom.add(MockElement::new(storage::file(file)).text(file.clone()));
            dom.add(MockElement::new(storage::file_rename(file)));
            dom.add(MockElement::new(storage::file_delete(file)));
        }
    }

    fn render_run(&self, dom: &mut MockDom, id: &str) {
        let Some(run) = self.runs.get(id) else {
            return;
        };
        dom.add(MockElement::new(run_log::RUN_LOG));
        dom.add(MockElement::new(run_log::RUN_ID).text(id.to_string()));
        dom.add(MockElement::new(run_log::RUN_STATUS).attr(TASK_STATUS_ATTR, run.status.as_str()));
        dom.add_after_polls(
            MockElement::new(run_log::task_locator(console::INIT_TASK)).attr(TASK_STATUS_ATTR, "SUCCESS"),
            2,
        );
        match run.status {
            RunStatus::Running => {
                dom.add_after_polls(
                    MockElement::new(run_log::SSH_LINK).attr("href", format!("{}/ssh/{}", console::BASE_URL, id)),
                    1,
                );
                dom.add(MockElement::new(run_log::PAUSE));
            }
            RunStatus::Paused => dom.add(MockElement::new(run_log::RESUME)),
            _ => {}
        }
        if !run.status.is_final() {
            dom.add(MockElement::new(run_log::STOP));
        }
    }

    fn render_users(&self, dom: &mut MockDom) {
        dom.add(MockElement::new(settings::SETTINGS));
        dom.add(MockElement::new(settings::USERS_TAB));
        dom.add(MockElement::new(settings::USER_TABLE));
        let mut search = MockElement::input(settings::USER_SEARCH);
        search.value = Some(self.user_filter.clone());
        dom.add(search);
        dom.add(MockElement::new(settings::CREATE_USER));

        let filter = self.user_filter.to_ascii_lowercase();
        let acting = self.acting.as_deref().map(str::to_ascii_lowercase);
        for (key, account) in self.accounts.iter().filter(|(key, _)| key.contains(&filter)) {
            let login = account.login.as_str();
            dom.add(
                MockElement::new(settings::user_row(login))
                    .text(login.to_string())
                    .attr(BLOCKED_ATTR, account.blocked.to_string()),
            );
            if acting.as_deref() != Some(key.as_str()) {
                dom.add(MockElement::new(Locator::keyed("user-impersonate", login)));
            }
            let toggle = if account.blocked { "user-unblock" } else { "user-block" };
            dom.add(MockElement::new(Locator::keyed(toggle, login)));
            dom.add(MockElement::new(Locator::keyed("user-delete", login)));
        }
    }

    fn render_dialog(&self, dom: &mut MockDom) {
        let Some(dialog) = &self.dialog else {
            return;
        };
        dom.add(MockElement::new(DIALOG));
        dom.add(MockElement::new(DIALOG_OK));
        dom.add(MockElement::new(DIALOG_CANCEL));
        match dialog {
            Dialog::CreateStorage | Dialog::CreateFolder => dom.add(MockElement::input(library::NAME_INPUT)),
            Dialog::RenameFile(_) => dom.add(MockElement::input(storage::RENAME_INPUT)),
            Dialog::StorageSettings { confirm_delete } => {
                let mut description = MockElement::input(storage::DESCRIPTION);
                if let Screen::Storage(name) = &self.screen {
                    description.value = self.storages.get(name).map(|s| s.description.clone());
                }
                dom.add(description);
                dom.add(MockElement::new(storage::DIALOG_CLOSE));
                dom.add(MockElement::new(storage::DELETE));
                if *confirm_delete {
                    dom.add(MockElement::new(storage::DELETE_CONFIRM));
                }
            }
            Dialog::Launch(_) => dom.add(MockElement::new(tools::LAUNCH_CONFIRM)),
            Dialog::CreateUser => dom.add(MockElement::input(settings::NEW_USER_LOGIN)),
            _ => {}
        }
    }
}

fn entered_name(dom: &MockDom) -> Option<String> {
    let name = dom.value(&library::NAME_INPUT)?.trim().to_string();
    (!name.is_empty()).then_some(name)
}

fn test_id(locator: &Locator) -> Option<&str> {
    match locator {
        Locator::TestId(id) => Some(id.as_ref()),
        _ => None,
    }
}

/// A [`MockBrowser`] scripted to behave like the console
pub struct MockConsole {
    browser: Arc<MockBrowser>,
    model: Arc<Mutex<ConsoleModel>>,
}

impl Default for MockConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConsole {
    pub fn new() -> Self {
        let browser = Arc::new(MockBrowser::new());
        let model = Arc::new(Mutex::new(ConsoleModel::new()));

        let m = model.clone();
        browser.on_navigate(move |dom, url| {
            let mut model = m.lock();
            model.navigate(dom, url);
            model.render(dom);
        });

        let m = model.clone();
        browser.on_any_click(move |dom, locator| {
            if let Some(id) = test_id(locator) {
                let mut model = m.lock();
                model.click(dom, id);
                model.render(dom);
            }
        });

        let m = model.clone();
        browser.on_any_keys(move |dom, locator| {
            if let Some(id) = test_id(locator) {
                let mut model = m.lock();
                if model.keys(dom, id) {
                    model.render(dom);
                }
            }
        });

        let m = model.clone();
        browser.on_tab_switch(move |dom, _tab| {
            let mut model = m.lock();
            if model.return_screen.is_some() {
                model.switch_back();
                model.render(dom);
            }
        });

        Self { browser, model }
    }

    pub fn browser(&self) -> Arc<MockBrowser> {
        self.browser.clone()
    }

    /// Seed a storage, as if created before the suite
    pub fn add_storage(&self, name: &str) {
        self.model.lock().storages.insert(name.to_string(), StorageModel::default());
    }

    pub fn add_folder(&self, name: &str) {
        self.model.lock().folders.insert(name.to_string());
    }

    pub fn has_storage(&self, name: &str) -> bool {
        self.model.lock().storages.contains_key(name)
    }

    pub fn storage_names(&self) -> Vec<String> {
        self.model.lock().storages.keys().cloned().collect()
    }

    pub fn storage_files(&self, name: &str) -> Vec<String> {
        self.model
            .lock()
            .storages
            .get(name)
            .map(|s| s.files.clone())
            .unwrap_or_default()
    }

    pub fn storage_description(&self, name: &str) -> Option<String> {
        self.model.lock().storages.get(name).map(|s| s.description.clone())
    }

    pub fn run_status(&self, id: &str) -> Option<RunStatus> {
        self.model.lock().runs.get(id).map(|r| r.status.clone())
    }

    pub fn run_ids(&self) -> Vec<String> {
        self.model.lock().runs.keys().cloned().collect()
    }

    pub fn user_exists(&self, login: &str) -> bool {
        self.model.lock().account(login).is_some()
    }

    pub fn is_blocked(&self, login: &str) -> bool {
        self.model.lock().account(login).map(|a| a.blocked).unwrap_or(false)
    }

    /// Ignore files handed to the upload input
    pub fn reject_uploads(&self, reject: bool) {
        self.model.lock().reject_uploads = reject;
    }

    pub fn set_blocked(&self, login: &str, blocked: bool) {
        if let Some(account) = self.model.lock().account_mut(login) {
            account.blocked = blocked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webdriver::Browser;

    #[tokio::test]
    async fn test_password_login_renders_home() {
        let console = MockConsole::new();
        let browser = console.browser();
        browser.navigate(console::BASE_URL).await.unwrap();
        assert!(browser.dom(|dom| dom.contains(&login::LOGIN_FORM)));

        browser.send_keys(&login::USERNAME, "admin").await.unwrap();
        browser.send_keys(&login::PASSWORD, console::ADMIN_PASSWORD).await.unwrap();
        browser.click(&login::SUBMIT).await.unwrap();

        browser.dom(|dom| {
            assert!(dom.contains(&home::MAIN_MENU));
            assert_eq!(dom.get(&home::USER_NAME).unwrap().text, "admin");
        });
    }

    #[tokio::test]
    async fn test_session_cookie_survives_navigation() {
        let console = MockConsole::new();
        let browser = console.browser();
        browser.set_cookie(console::SESSION_COOKIE, "user").await.unwrap();
        browser.navigate(&format!("{}/", console::BASE_URL)).await.unwrap();
        assert_eq!(browser.dom(|dom| dom.get(&home::USER_NAME).unwrap().text.clone()), "user");

        browser.delete_cookies().await.unwrap();
        browser.refresh().await.unwrap();
        assert!(browser.dom(|dom| dom.contains(&login::LOGIN_FORM)));
    }

    #[test]
    fn test_terminal_commands() {
        let mut model = ConsoleModel::new();
        model.screen = Screen::Shell("1001".into());
        assert_eq!(model.execute("echo hi there"), "hi there");
        assert_eq!(model.execute("hostname"), "pipeline-1001");
        assert!(model.execute("frobnicate").ends_with("command not found"));
    }
}
