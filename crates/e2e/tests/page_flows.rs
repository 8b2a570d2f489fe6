use std::sync::Arc;

use pagewalk_common::{ResourceKind, ResourceRef};
use pagewalk_e2e::fixture::{Fixture, UiJanitor};
use pagewalk_e2e::mock::ManualClock;
use pagewalk_e2e::pages::{LibraryPage, RunStatus, StorageSettings};
use pagewalk_e2e::testing::{admin, console, user, MockConsole};
use pagewalk_e2e::{perform_within, E2eError, Session};

fn session(console: &MockConsole) -> Session {
    Session::new(console::config(), console.browser(), Arc::new(ManualClock::new()))
}

/// Storage pages chain from the library and back, with the settings dialog
/// entered and left around each use.
#[tokio::test]
async fn storage_pages_chain_through_the_library() {
    let console = MockConsole::new();
    let session = session(&console);
    session.open("/").await.unwrap();

    let home = session.login_as(&admin()).await.unwrap();
    let storage = home
        .library()
        .await
        .unwrap()
        .create_storage("reports")
        .await
        .unwrap()
        .upload_contents("a.csv", b"1,2,3\n")
        .await
        .unwrap()
        .set_description("quarterly numbers")
        .await
        .unwrap();

    assert!(storage.has_file("a.csv").await.unwrap());
    assert_eq!(console.storage_files("reports"), vec!["a.csv".to_string()]);
    assert_eq!(console.storage_description("reports").as_deref(), Some("quarterly numbers"));

    let library: LibraryPage = storage.delete().await.unwrap();
    assert!(!library.has_item("reports").await.unwrap());
    assert!(!console.has_storage("reports"));
}

/// Leaving the settings dialog runs even when the work inside fails, and the
/// work's error is the one reported.
#[tokio::test]
async fn settings_dialog_is_closed_after_a_failure() {
    let console = MockConsole::new();
    console.add_storage("inbox");
    let session = session(&console);
    session.open("/").await.unwrap();

    let storage = session
        .login_as(&admin())
        .await
        .unwrap()
        .library()
        .await
        .unwrap()
        .open_storage("inbox")
        .await
        .unwrap();

    let err = perform_within::<_, StorageSettings, _, _, _>(&storage, |_settings| async move {
        Err::<(), _>(E2eError::StepFailed {
            step: "edit settings".into(),
            reason: "nothing to edit".into(),
        })
    })
    .await
    .unwrap_err();

    assert!(err.to_string().contains("nothing to edit"));
    assert!(!session.is_displayed(&pagewalk_e2e::pages::DIALOG).await.unwrap());
    assert_eq!(storage.title().await.unwrap(), "inbox");
}

/// Cleanup removes what a fixture recorded, newest first, and reports
/// resources that were never created as already absent.
#[tokio::test]
async fn fixture_teardown_removes_recorded_resources() {
    let console = MockConsole::new();
    let session = session(&console);
    session.open("/").await.unwrap();
    let home = session.login_as(&admin()).await.unwrap();

    let fixture = Fixture::new("PageFlows");
    let storage = fixture.claim(ResourceKind::Storage).unwrap();
    let folder = fixture.claim(ResourceKind::Folder).unwrap();
    let never_created = fixture.claim(ResourceKind::Storage).unwrap();
    let account = fixture.claim(ResourceKind::User).unwrap();

    home.library()
        .await
        .unwrap()
        .create_storage(&storage.name)
        .await
        .unwrap();
    session
        .home()
        .unwrap()
        .library()
        .await
        .unwrap()
        .create_folder(&folder.name)
        .await
        .unwrap();
    session
        .home()
        .unwrap()
        .settings()
        .await
        .unwrap()
        .user_management()
        .await
        .unwrap()
        .create_user(&account.name)
        .await
        .unwrap();
    assert!(console.user_exists(&account.name));

    let janitor = UiJanitor::new(&session, Some(admin()));
    let report = fixture.teardown(&janitor).await;

    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.removed, vec![account.clone(), folder, storage.clone()]);
    assert_eq!(report.already_absent, vec![never_created]);
    assert!(!console.has_storage(&storage.name));
    assert!(!console.user_exists(&account.name));

    // a second teardown does not touch the console again
    let again = fixture.teardown(&janitor).await;
    assert_eq!(again.removed.len(), 3);
}

/// Cleanup logs back in as the cleanup identity when a case left someone
/// else acting.
#[tokio::test]
async fn cleanup_switches_identity() {
    let console = MockConsole::new();
    console.add_storage("left-over");
    let session = session(&console);
    session.open("/").await.unwrap();
    session.login_as(&user()).await.unwrap();

    let fixture = Fixture::new("Identity");
    fixture.register(ResourceRef::new(ResourceKind::Storage, "left-over"));

    let report = fixture.teardown(&UiJanitor::new(&session, Some(admin()))).await;
    assert!(report.is_clean());
    assert_eq!(session.identity().unwrap().login, "admin");
    assert!(!console.has_storage("left-over"));
}

/// Run controls move the run through its states and the list follows.
#[tokio::test]
async fn run_controls_and_list() {
    let console = MockConsole::new();
    let session = session(&console);
    session.open("/").await.unwrap();

    let log = session
        .login_as(&admin())
        .await
        .unwrap()
        .tools()
        .await
        .unwrap()
        .launch(console::TOOL)
        .await
        .unwrap()
        .wait_for_task(console::INIT_TASK)
        .await
        .unwrap();
    let id = log.run_id().await.unwrap();
    assert_eq!(log.status().await.unwrap(), RunStatus::Running);

    let log = log.pause().await.unwrap();
    assert_eq!(console.run_status(&id), Some(RunStatus::Paused));
    log.resume().await.unwrap();

    let runs = session.home().unwrap().runs().await.unwrap().active().await.unwrap();
    assert_eq!(runs.status_of(&id).await.unwrap(), RunStatus::Running);
    let runs = runs.stop_run(&id).await.unwrap();
    assert!(!runs.has_run(&id).await.unwrap());

    let completed = runs.completed().await.unwrap();
    assert_eq!(completed.status_of(&id).await.unwrap(), RunStatus::Stopped);
}

/// The terminal opens in its own tab; leaving closes it and returns to the
/// run log.
#[tokio::test]
async fn shell_tab_is_closed_on_leave() {
    let console = MockConsole::new();
    let session = session(&console);
    session.open("/").await.unwrap();
    let log = session
        .login_as(&admin())
        .await
        .unwrap()
        .tools()
        .await
        .unwrap()
        .launch(console::TOOL)
        .await
        .unwrap();
    let id = log.run_id().await.unwrap();

    let hostname = perform_within::<_, pagewalk_e2e::pages::ShellPage, _, _, _>(&log, |shell| async move {
        let shell = shell.execute("hostname").await?;
        shell.output().await
    })
    .await
    .unwrap();
    assert!(hostname.contains(&format!("pipeline-{}", id)));

    assert_eq!(session.tabs().await.unwrap().len(), 1);
    assert_eq!(log.run_id().await.unwrap(), id);
}

/// Leaving the terminal returns to the tab the run log was in, even when
/// that is not the first tab.
#[tokio::test]
async fn shell_returns_to_originating_tab() {
    let console = MockConsole::new();
    let session = session(&console);
    session.open("/").await.unwrap();
    let first = session.current_tab().await.unwrap();
    let log = session
        .login_as(&admin())
        .await
        .unwrap()
        .tools()
        .await
        .unwrap()
        .launch(console::TOOL)
        .await
        .unwrap();
    let second = session.open_tab().await.unwrap();
    assert_ne!(first, second);

    perform_within::<_, pagewalk_e2e::pages::ShellPage, _, _, _>(&log, |shell| async move {
        shell.execute("hostname").await.map(|_| ())
    })
    .await
    .unwrap();

    assert_eq!(session.current_tab().await.unwrap(), second);
    assert_eq!(session.tabs().await.unwrap(), vec![first, second]);
}

/// Blocked accounts are refused at login with the console's reason.
#[tokio::test]
async fn blocked_account_is_refused() {
    let console = MockConsole::new();
    console.set_blocked("user", true);
    let session = session(&console);
    session.open("/").await.unwrap();

    match session.login_as(&user()).await {
        Err(E2eError::Authentication { reason, .. }) => assert!(reason.contains("blocked"), "{reason}"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("blocked account logged in"),
    }
    assert!(!session.is_logged_in());
}
