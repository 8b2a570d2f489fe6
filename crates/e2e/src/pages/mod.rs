//! Typed page objects for the console
//!
//! Every screen is its own type and every operation returns the type of the
//! screen it leads to, so an impossible navigation does not compile. Pages
//! borrow the [`Session`] they were created from and remember its epoch; once
//! the session logs out or restarts, old pages refuse to act.

use crate::error::{E2eError, E2eResult};
use crate::expect::Expect;
use crate::locator::{Condition, Locator};
use crate::session::Session;

/// Implement [`Page`] for a `struct X<'s> { ctx: PageCtx<'s> }`
macro_rules! page {
    ($ty:ident, $name:literal, $marker:expr) => {
        impl<'s> $crate::pages::Page<'s> for $ty<'s> {
            const NAME: &'static str = $name;
            const MARKER: $crate::locator::Locator = $marker;

            fn from_ctx(ctx: $crate::pages::PageCtx<'s>) -> Self {
                Self { ctx }
            }

            fn ctx(&self) -> &$crate::pages::PageCtx<'s> {
                &self.ctx
            }
        }
    };
}
pub(crate) use page;

pub mod home;
pub mod library;
pub mod login;
pub mod run_log;
pub mod runs;
pub mod settings;
pub mod shell;
pub mod storage;
pub mod tools;

pub use home::HomePage;
pub use library::LibraryPage;
pub use login::LoginPage;
pub use run_log::{RunLogPage, RunStatus, TaskStatus};
pub use runs::RunsPage;
pub use settings::{SettingsPage, UserManagementTab};
pub use shell::ShellPage;
pub use storage::{StoragePage, StorageSettings};
pub use tools::ToolsPage;

/// Confirmation button shared by every modal dialog
pub const DIALOG_OK: Locator = Locator::id("dialog-ok");
pub const DIALOG_CANCEL: Locator = Locator::id("dialog-cancel");
pub const DIALOG: Locator = Locator::id("dialog");

/// Session handle stamped with the epoch it was issued in
#[derive(Clone, Copy)]
pub struct PageCtx<'s> {
    session: &'s Session,
    epoch: u64,
}

impl std::fmt::Debug for PageCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCtx").field("epoch", &self.epoch).finish_non_exhaustive()
    }
}

impl<'s> PageCtx<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            session,
            epoch: session.epoch(),
        }
    }

    /// The session, provided it has not moved on since this page was created
    pub fn session(&self, page: &str) -> E2eResult<&'s Session> {
        if self.session.epoch() != self.epoch {
            return Err(E2eError::StalePage {
                page: page.to_string(),
            });
        }
        Ok(self.session)
    }

    /// Wait for `P` to be displayed and hand it out
    pub async fn arrive<P: Page<'s>>(self) -> E2eResult<P> {
        let session = self.session(P::NAME)?;
        session
            .expect()
            .ensure_spec(
                &crate::locator::ExpectationSpec::new(P::MARKER, [Condition::Visible])
                    .within(session.config().timeouts.page_load()),
            )
            .await?;
        Ok(P::from_ctx(self))
    }
}

/// A screen of the console
pub trait Page<'s>: Sized {
    const NAME: &'static str;

    /// Element whose presence proves the screen is displayed
    const MARKER: Locator;

    fn from_ctx(ctx: PageCtx<'s>) -> Self;

    fn ctx(&self) -> &PageCtx<'s>;

    fn session(&self) -> E2eResult<&'s Session> {
        self.ctx().session(Self::NAME)
    }

    fn expect(&self) -> E2eResult<Expect<'s>> {
        Ok(self.session()?.expect())
    }
}

/// Click the dialog OK button and wait for the dialog to close
pub(crate) async fn confirm_dialog(session: &Session) -> E2eResult<()> {
    session.click(&DIALOG_OK).await?;
    session.expect().ensure(&DIALOG, &[Condition::Hidden]).await?;
    Ok(())
}
