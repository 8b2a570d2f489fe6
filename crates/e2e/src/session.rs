//! Session/context manager: browser lifecycle and the acting identity

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use pagewalk_common::{Credentials, Identity, SuiteConfig};

use crate::error::{E2eError, E2eResult};
use crate::expect::Expect;
use crate::locator::{Condition, Locator};
use crate::pages::{home, login, HomePage, LoginPage, PageCtx};
use crate::wait::{wait_until, Clock, Probe, SystemClock, WaitPolicy};
use crate::webdriver::{Browser, TabId, WebDriverClient};

#[derive(Debug, Default)]
struct SessionState {
    opened: bool,
    /// Bumped whenever pages issued so far stop being valid
    epoch: u64,
    identity: Option<Identity>,
    /// Who we were before impersonating
    original: Option<Identity>,
}

/// What the console shows after a login attempt or a page load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Landing {
    LoginForm,
    Home,
    AuthError(String),
}

/// One browser session against the console
pub struct Session {
    config: SuiteConfig,
    browser: Arc<dyn Browser>,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(config: SuiteConfig, browser: Arc<dyn Browser>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            browser,
            clock,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Open a WebDriver session described by `config.browser`
    pub async fn connect(config: SuiteConfig) -> E2eResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.browser.download_dir)?;
        let browser = WebDriverClient::connect(&config.browser).await?;
        Ok(Self::new(config, Arc::new(browser), Arc::new(SystemClock::new())))
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn browser(&self) -> &dyn Browser {
        self.browser.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn expect(&self) -> Expect<'_> {
        Expect::new(self.browser.as_ref(), self.clock.as_ref(), &self.config.timeouts)
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.lock().identity.clone()
    }

    pub fn original_identity(&self) -> Option<Identity> {
        self.state.lock().original.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.lock().identity.is_some()
    }

    fn require_open(&self) -> E2eResult<()> {
        if self.state.lock().opened {
            Ok(())
        } else {
            Err(E2eError::NoSession)
        }
    }

    /// Forget the identity and invalidate every page handed out so far
    fn reset_identity(&self) {
        let mut state = self.state.lock();
        state.identity = None;
        state.original = None;
        state.epoch += 1;
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Load `address` (absolute, or relative to the configured base url)
    pub async fn open(&self, address: &str) -> E2eResult<()> {
        let url = self.config.url(address);
        info!("Opening {}", url);
        self.browser.navigate(&url).await.map_err(|e| match e {
            E2eError::Navigation { .. } => e,
            other => E2eError::Navigation {
                url: url.clone(),
                reason: other.to_string(),
            },
        })?;
        self.state.lock().opened = true;
        Ok(())
    }

    /// Log in and land on the home page.
    ///
    /// Whoever is logged in is logged out first. Rejected credentials and
    /// blocked accounts surface as [`E2eError::Authentication`].
    pub async fn login_as(&self, identity: &Identity) -> E2eResult<HomePage<'_>> {
        self.require_open()?;
        self.logout_if_needed().await?;
        info!("Logging in as {}", identity.login);

        match &identity.credentials {
            Credentials::Password(password) => {
                self.open("/").await?;
                if self.wait_landing(true).await? == Landing::Home {
                    // a cookie from an earlier run logged us straight in
                    self.perform_logout().await?;
                    self.open("/").await?;
                }
                PageCtx::new(self)
                    .arrive::<LoginPage>()
                    .await?
                    .fill_username(&identity.login)
                    .await?
                    .fill_password(password)
                    .await?
                    .submit_as(identity)
                    .await
            }
            Credentials::Token(token) => {
                self.browser
                    .set_cookie(&self.config.auth.token_cookie, token)
                    .await?;
                self.browser.refresh().await?;
                self.finish_login(identity).await
            }
        }
    }

    /// Wait for the outcome of a submitted login and record the identity
    pub(crate) async fn finish_login(&self, identity: &Identity) -> E2eResult<HomePage<'_>> {
        match self.wait_landing(false).await? {
            Landing::Home => {}
            Landing::AuthError(reason) => {
                return Err(E2eError::Authentication {
                    login: identity.login.clone(),
                    reason,
                })
            }
            Landing::LoginForm => {
                return Err(E2eError::Authentication {
                    login: identity.login.clone(),
                    reason: "still on the login form".to_string(),
                })
            }
        }

        let shown = self.current_user().await?;
        if !identity.is(&shown) {
            return Err(E2eError::Authentication {
                login: identity.login.clone(),
                reason: format!("console reports user '{}'", shown),
            });
        }

        self.state.lock().identity = Some(identity.clone());
        debug!("Logged in as {}", identity.login);
        Ok(HomePage::from_session(self))
    }

    /// Poll until the console shows the home page, an authentication error
    /// or (when `allow_login_form`) the login form.
    pub async fn wait_landing(&self, allow_login_form: bool) -> E2eResult<Landing> {
        let browser = self.browser.as_ref();
        let policy = WaitPolicy::from_config(&self.config.timeouts).with_timeout(self.config.timeouts.page_load());

        wait_until(self.clock.as_ref(), policy, "console landing page", || async move {
            let errors = browser.query(&login::AUTH_ERROR).await?;
            if let Some(error) = errors.iter().find(|s| s.visible) {
                return Ok(Probe::Ready(Landing::AuthError(error.text.trim().to_string())));
            }
            if browser.query(&home::MAIN_MENU).await?.iter().any(|s| s.visible) {
                return Ok(Probe::Ready(Landing::Home));
            }
            if allow_login_form && browser.query(&login::LOGIN_FORM).await?.iter().any(|s| s.visible) {
                return Ok(Probe::Ready(Landing::LoginForm));
            }
            Ok(Probe::Pending("neither home page nor login outcome".to_string()))
        })
        .await
    }

    /// Name shown in the header for the acting user
    pub async fn current_user(&self) -> E2eResult<String> {
        Ok(self.text_of(&home::USER_NAME).await?.trim().to_string())
    }

    /// Log out; a no-op when nobody is logged in
    pub async fn logout(&self) -> E2eResult<()> {
        if self.state.lock().identity.is_none() {
            debug!("logout: nobody is logged in");
            return Ok(());
        }
        self.perform_logout().await
    }

    /// Log out if the console shows a logged-in user, whatever we think
    pub async fn logout_if_needed(&self) -> E2eResult<()> {
        if !self.state.lock().opened {
            return Ok(());
        }
        let logged_in = self
            .browser
            .query(&home::MAIN_MENU)
            .await?
            .iter()
            .any(|s| s.visible);
        if logged_in {
            return self.perform_logout().await;
        }
        if self.is_logged_in() {
            self.browser.delete_cookies().await?;
            self.reset_identity();
        }
        Ok(())
    }

    async fn perform_logout(&self) -> E2eResult<()> {
        info!("Logging out");
        self.click(&home::USER_MENU).await?;
        self.click(&home::LOGOUT).await?;
        self.expect()
            .ensure(&login::LOGIN_FORM, &[Condition::Visible])
            .await?;
        self.browser.delete_cookies().await?;
        self.browser.clear_storage().await?;
        self.reset_identity();
        Ok(())
    }

    /// Act as `identity` without re-entering credentials
    pub async fn impersonate_as(&self, identity: &Identity) -> E2eResult<HomePage<'_>> {
        if !self.config.auth.impersonation_enabled {
            return Err(E2eError::Impersonation(
                "impersonation is disabled in the configuration".to_string(),
            ));
        }
        let (current, original) = {
            let state = self.state.lock();
            (state.identity.clone(), state.original.clone())
        };
        let current = current.ok_or(E2eError::NotLoggedIn)?;
        if original.is_some() {
            return Err(E2eError::Impersonation(format!(
                "already impersonating {}",
                current
            )));
        }

        info!("{} impersonates {}", current, identity);
        let home = self
            .home()?
            .settings()
            .await?
            .user_management()
            .await?
            .impersonate(&identity.login)
            .await?;

        let shown = self.current_user().await?;
        if !identity.is(&shown) {
            return Err(E2eError::Impersonation(format!(
                "expected to act as {}, console shows {}",
                identity, shown
            )));
        }

        let mut state = self.state.lock();
        state.original = Some(current);
        state.identity = Some(identity.clone());
        Ok(home)
    }

    /// Return to the identity that started impersonating
    pub async fn stop_impersonation(&self) -> E2eResult<HomePage<'_>> {
        let Some(original) = self.original_identity() else {
            debug!("stop_impersonation: not impersonating");
            return self.home();
        };

        info!("Stopping impersonation, back to {}", original);
        self.click(&home::STOP_IMPERSONATION).await?;
        self.expect()
            .ensure(&home::IMPERSONATION_BANNER, &[Condition::Hidden])
            .await?;

        let shown = self.current_user().await?;
        if !original.is(&shown) {
            return Err(E2eError::Impersonation(format!(
                "expected to be back as {}, console shows {}",
                original, shown
            )));
        }

        let mut state = self.state.lock();
        state.identity = Some(original);
        state.original = None;
        drop(state);
        Ok(HomePage::from_session(self))
    }

    /// Home page handle for the current identity
    pub fn home(&self) -> E2eResult<HomePage<'_>> {
        if !self.is_logged_in() {
            return Err(E2eError::NotLoggedIn);
        }
        Ok(HomePage::from_session(self))
    }

    /// Start over with a fresh browser session
    pub async fn restart(&self) -> E2eResult<()> {
        info!("Restarting browser session");
        self.browser.restart().await?;
        self.reset_identity();
        self.state.lock().opened = false;
        Ok(())
    }

    /// Drop every cookie, which also ends the console login
    pub async fn clear_cookies(&self) -> E2eResult<()> {
        self.browser.delete_cookies().await?;
        self.reset_identity();
        Ok(())
    }

    pub async fn refresh(&self) -> E2eResult<()> {
        self.browser.refresh().await
    }

    pub async fn close(&self) -> E2eResult<()> {
        self.browser.quit().await
    }

    // ── tabs ────────────────────────────────────────────────────────────────

    /// Open a new tab and switch to it
    pub async fn open_tab(&self) -> E2eResult<TabId> {
        let tab = self.browser.open_tab().await?;
        self.browser.switch_to_tab(&tab).await?;
        Ok(tab)
    }

    pub async fn switch_to_tab(&self, tab: &TabId) -> E2eResult<()> {
        self.browser.switch_to_tab(tab).await
    }

    pub async fn current_tab(&self) -> E2eResult<TabId> {
        self.browser.current_tab().await
    }

    /// Close the current tab and switch to `back_to`
    pub async fn close_tab(&self, back_to: &TabId) -> E2eResult<()> {
        self.browser.close_tab().await?;
        self.browser.switch_to_tab(back_to).await
    }

    pub async fn tabs(&self) -> E2eResult<Vec<TabId>> {
        self.browser.tabs().await
    }

    // ── interactions ────────────────────────────────────────────────────────

    pub async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.require_open()?;
        debug!("click {}", locator);
        self.expect().interactable(locator).await?;
        self.browser.click(locator).await
    }

    /// Replace the content of an input
    pub async fn type_into(&self, locator: &Locator, text: &str) -> E2eResult<()> {
        self.require_open()?;
        debug!("type into {}", locator);
        self.expect().interactable(locator).await?;
        self.browser.clear(locator).await?;
        self.browser.send_keys(locator, text).await
    }

    /// Send keys without clearing first
    pub async fn press_keys(&self, locator: &Locator, keys: &str) -> E2eResult<()> {
        self.require_open()?;
        self.expect().interactable(locator).await?;
        self.browser.send_keys(locator, keys).await
    }

    pub async fn select(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.require_open()?;
        debug!("select {:?} in {}", value, locator);
        self.expect().interactable(locator).await?;
        self.browser.select_option(locator, value).await
    }

    /// Hand a local file to a (usually hidden) file input
    pub async fn upload(&self, locator: &Locator, path: &Path) -> E2eResult<()> {
        self.require_open()?;
        let absolute = std::fs::canonicalize(path)?;
        debug!("upload {} via {}", absolute.display(), locator);
        self.expect().ensure(locator, &[Condition::Exists]).await?;
        self.browser
            .send_keys(locator, &absolute.to_string_lossy())
            .await
    }

    /// Text of the first visible match
    pub async fn text_of(&self, locator: &Locator) -> E2eResult<String> {
        let states = self.expect().ensure(locator, &[Condition::Visible]).await?;
        Ok(states
            .into_iter()
            .find(|s| s.visible)
            .map(|s| s.text)
            .unwrap_or_default())
    }

    /// Immediate check, no waiting
    pub async fn is_displayed(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(self.browser.query(locator).await?.iter().any(|s| s.visible))
    }

    // ── artifacts ───────────────────────────────────────────────────────────

    /// Save a screenshot as `<label>-<hash>.png` under `dir`
    pub async fn screenshot_to(&self, dir: &Path, label: &str) -> E2eResult<PathBuf> {
        let png = self.browser.screenshot().await?;
        let digest = hex::encode(Sha256::digest(&png));
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}-{}.png", sanitize(label), &digest[..12]));
        std::fs::write(&path, &png)?;
        info!("Screenshot saved to {}", path.display());
        Ok(path)
    }

    /// Best-effort screenshot used on failure paths
    pub async fn try_screenshot(&self, dir: &Path, label: &str) -> Option<PathBuf> {
        match self.screenshot_to(dir, label).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not capture screenshot for {}: {}", label, e);
                None
            }
        }
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ManualClock, MockBrowser};
    use crate::testing::{admin, console, user, MockConsole};

    fn session(browser: Arc<MockBrowser>) -> Session {
        Session::new(console::config(), browser, Arc::new(ManualClock::new()))
    }

    #[tokio::test]
    async fn test_navigation_requires_open_session() {
        let browser = Arc::new(MockBrowser::new());
        let session = session(browser);
        let err = session.login_as(&admin()).await.unwrap_err();
        assert!(matches!(err, E2eError::NoSession));
        assert!(matches!(session.home(), Err(E2eError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_open_unreachable_address() {
        let browser = Arc::new(MockBrowser::new());
        browser.unreachable("http://console.test");
        let session = session(browser);
        let err = session.open("/").await.unwrap_err();
        assert!(matches!(err, E2eError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_login_then_switch_user() {
        let console = MockConsole::new();
        let session = session(console.browser());
        session.open("/").await.unwrap();

        session.login_as(&admin()).await.unwrap();
        assert_eq!(session.identity().unwrap().login, "admin");

        session.logout_if_needed().await.unwrap();
        assert!(session.identity().is_none());

        session.login_as(&user()).await.unwrap();
        assert_eq!(session.identity().unwrap().login, "user");
        assert_eq!(session.current_user().await.unwrap(), "user");
    }

    #[tokio::test]
    async fn test_login_as_logs_out_previous_identity() {
        let console = MockConsole::new();
        let session = session(console.browser());
        session.open("/").await.unwrap();
        session.login_as(&user()).await.unwrap();
        session.login_as(&admin()).await.unwrap();
        assert_eq!(session.current_user().await.unwrap(), "admin");
    }

    #[tokio::test]
    async fn test_token_login() {
        let console = MockConsole::new();
        let session = session(console.browser());
        session.open("/").await.unwrap();
        let id = Identity::with_token("admin", console::ADMIN_TOKEN);
        session.login_as(&id).await.unwrap();
        assert_eq!(session.current_user().await.unwrap(), "admin");
    }

    #[tokio::test]
    async fn test_bad_password_is_authentication_error() {
        let console = MockConsole::new();
        let session = session(console.browser());
        session.open("/").await.unwrap();
        let err = session
            .login_as(&Identity::with_password("admin", "wrong"))
            .await
            .unwrap_err();
        match err {
            E2eError::Authentication { login, reason } => {
                assert_eq!(login, "admin");
                assert!(reason.contains("Invalid credentials"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let console = MockConsole::new();
        let session = session(console.browser());
        session.logout().await.unwrap();
        session.logout_if_needed().await.unwrap();

        session.open("/").await.unwrap();
        session.login_as(&admin()).await.unwrap();
        session.logout().await.unwrap();
        session.logout().await.unwrap();
        session.logout_if_needed().await.unwrap();
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_pages_go_stale_after_logout() {
        let console = MockConsole::new();
        let session = session(console.browser());
        session.open("/").await.unwrap();
        let home = session.login_as(&admin()).await.unwrap();
        session.logout().await.unwrap();

        let err = home.library().await.unwrap_err();
        assert!(matches!(err, E2eError::StalePage { .. }));
    }

    #[tokio::test]
    async fn test_impersonation_round_trip() {
        let console = MockConsole::new();
        let session = session(console.browser());
        session.open("/").await.unwrap();
        session.login_as(&admin()).await.unwrap();

        session.impersonate_as(&user()).await.unwrap();
        assert_eq!(session.identity().unwrap().login, "user");
        assert_eq!(session.original_identity().unwrap().login, "admin");
        assert!(session.impersonate_as(&user()).await.is_err());

        session.stop_impersonation().await.unwrap();
        assert_eq!(session.identity().unwrap().login, "admin");
        assert!(session.original_identity().is_none());
        assert_eq!(session.current_user().await.unwrap(), "admin");
    }

    #[tokio::test]
    async fn test_restart_invalidates_pages_and_requires_open() {
        let console = MockConsole::new();
        let browser = console.browser();
        let session = session(browser.clone());
        session.open("/").await.unwrap();
        let home = session.login_as(&admin()).await.unwrap();

        session.restart().await.unwrap();
        assert_eq!(browser.restarts(), 1);
        assert!(matches!(home.runs().await, Err(E2eError::StalePage { .. })));
        assert!(matches!(session.click(&home::USER_MENU).await, Err(E2eError::NoSession)));
    }

    #[tokio::test]
    async fn test_screenshot_naming() {
        let console = MockConsole::new();
        let session = session(console.browser());
        let dir = tempfile::tempdir().unwrap();
        let path = session.screenshot_to(dir.path(), "storage lifecycle/rename").await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("storage_lifecycle_rename-"));
        assert!(name.ends_with(".png"));
    }
}
