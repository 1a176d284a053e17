mod common;

use common::{Harness, MockGateway, RepositoryData, issue, repository};
use gitissues::issues::{
    CredentialStore, Credentials, ErrorKind, IssueError, LoginOptions, MemoryCredentialStore,
    Options, RepositoryId, RepositoryRef, StateEvent,
};

fn disabled_repository() -> RepositoryRef {
    RepositoryRef {
        has_issues: false,
        ..repository(3, "no-tracker", 0)
    }
}

fn gateway() -> MockGateway {
    let one = repository(1, "one", 2);
    let two = repository(2, "two", 1);
    let empty = repository(4, "empty", 0);

    MockGateway::new()
        .with_repositories(vec![
            one.clone(),
            disabled_repository(),
            two.clone(),
            empty,
            // Also listed through an organization
            repository(1, "one", 2),
        ])
        .with_data(
            &one,
            RepositoryData {
                issues: vec![issue(1, "First", ""), issue(2, "Second", "")],
                ..RepositoryData::default()
            },
        )
        .with_data(
            &two,
            RepositoryData {
                issues: vec![issue(7, "Seventh", "")],
                ..RepositoryData::default()
            },
        )
}

fn names(repositories: &[RepositoryRef]) -> Vec<&str> {
    repositories
        .iter()
        .map(|repository| repository.name.as_str())
        .collect()
}

#[tokio::test]
async fn test_login_loads_repositories_and_selects_first() {
    let harness = Harness::new(gateway());
    let mut events = harness.state.subscribe();

    let user = harness
        .state
        .login(Credentials::token("secret"))
        .await
        .unwrap();

    assert_eq!(user.login, "octocat");
    assert!(harness.state.is_logged_in());
    assert_eq!(harness.state.user(), Some(user));
    assert_eq!(harness.store.credentials(), Some(Credentials::token("secret")));

    let repositories = harness.state.repositories();
    assert_eq!(names(&repositories), vec!["one", "two", "empty"]);
    assert_eq!(harness.state.repository().map(|r| r.id), Some(RepositoryId(1)));
    assert_eq!(harness.issue_numbers(), vec![1, 2]);
    assert_eq!(harness.stored_repository(), Some(RepositoryId(1)));

    assert_eq!(events.try_recv().unwrap(), StateEvent::LoggedInChanged);
    assert_eq!(events.try_recv().unwrap(), StateEvent::UserChanged);
}

#[tokio::test]
async fn test_hide_repositories_with_no_issues() {
    let options = Options {
        hide_repositories_with_no_issues: true,
        ..Options::default()
    };
    let harness = Harness::with_options(gateway(), options);

    harness
        .state
        .login(Credentials::token("secret"))
        .await
        .unwrap();

    assert_eq!(names(&harness.state.repositories()), vec!["one", "two"]);
}

#[tokio::test]
async fn test_login_restores_stored_repository() {
    let store = MemoryCredentialStore::new();
    store.set_selected_repository_id(Some(RepositoryId(2))).unwrap();
    let harness = Harness::with_store(gateway(), Options::default(), store);

    harness
        .state
        .login(Credentials::basic("octocat", "password"))
        .await
        .unwrap();

    assert_eq!(harness.state.repository().map(|r| r.id), Some(RepositoryId(2)));
    assert_eq!(harness.issue_numbers(), vec![7]);
}

#[tokio::test]
async fn test_unknown_stored_repository_falls_back_to_first() {
    let store = MemoryCredentialStore::new();
    store.set_selected_repository_id(Some(RepositoryId(404))).unwrap();
    let harness = Harness::with_store(gateway(), Options::default(), store);

    harness
        .state
        .login(Credentials::token("secret"))
        .await
        .unwrap();

    assert_eq!(harness.state.repository().map(|r| r.id), Some(RepositoryId(1)));
}

#[tokio::test]
async fn test_rejected_login_logs_out() {
    let store = MemoryCredentialStore::new();
    store.save_credentials(&Credentials::token("stale")).unwrap();
    let harness = Harness::with_store(gateway(), Options::default(), store);
    harness.gateway.fail(
        "authenticate",
        IssueError::Authentication("Bad credentials".to_string()),
    );

    let result = harness.state.login(Credentials::token("stale")).await;

    let err = match result {
        Err(err) => err,
        Ok(user) => panic!("login should fail, got {:?}", user),
    };
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
    assert!(!harness.state.is_logged_in());
    assert!(harness.store.credentials().is_none());
    assert_eq!(harness.gateway.calls("sign_out"), 1);
    assert_eq!(harness.gateway.calls("fetch_repositories"), 0);
    assert_eq!(harness.reporter.count(), 1);
}

#[tokio::test]
async fn test_network_failure_during_login_keeps_credentials() {
    let store = MemoryCredentialStore::new();
    store.save_credentials(&Credentials::token("kept")).unwrap();
    let harness = Harness::with_store(gateway(), Options::default(), store);
    harness
        .gateway
        .fail("authenticate", IssueError::Network("offline".to_string()));

    let result = harness.state.login(Credentials::token("kept")).await;

    assert!(matches!(result, Err(IssueError::Network(_))));
    assert_eq!(harness.store.credentials(), Some(Credentials::token("kept")));
    assert_eq!(harness.gateway.calls("sign_out"), 0);
}

#[tokio::test]
async fn test_repository_load_failure_does_not_fail_login() {
    let harness = Harness::new(gateway());
    harness.gateway.fail(
        "fetch_repositories",
        IssueError::RemoteRejection {
            status: 403,
            message: "API rate limit exceeded".to_string(),
        },
    );

    let user = harness.state.login(Credentials::token("secret")).await;

    assert!(user.is_ok());
    assert!(harness.state.is_logged_in());
    assert!(harness.state.repositories().is_empty());
    assert_eq!(harness.reporter.count(), 1);
}

#[tokio::test]
async fn test_logout_clears_session_but_keeps_selection() {
    let harness = Harness::new(gateway());
    harness
        .state
        .login(Credentials::token("secret"))
        .await
        .unwrap();

    harness.state.logout();

    assert!(!harness.state.is_logged_in());
    assert!(harness.state.user().is_none());
    assert!(harness.state.repositories().is_empty());
    assert!(harness.state.repository().is_none());
    assert!(harness.state.all_issues().is_empty());
    assert!(harness.store.credentials().is_none());
    assert_eq!(harness.stored_repository(), Some(RepositoryId(1)));
    assert_eq!(harness.gateway.calls("sign_out"), 1);
}

#[tokio::test]
async fn test_login_from_store() {
    let harness = Harness::new(gateway());
    assert_eq!(harness.state.login_from_store().await.unwrap(), None);
    assert_eq!(harness.gateway.calls("authenticate"), 0);

    harness
        .store
        .save_credentials(&Credentials::token("secret"))
        .unwrap();
    let user = harness.state.login_from_store().await.unwrap();
    assert_eq!(user.map(|user| user.login), Some("octocat".to_string()));
    assert!(harness.state.is_logged_in());
}

#[tokio::test]
async fn test_session_only_login_leaves_store_untouched() {
    let store = MemoryCredentialStore::new();
    store.set_selected_repository_id(Some(RepositoryId(2))).unwrap();
    let harness = Harness::with_store(gateway(), Options::default(), store);

    let user = harness
        .state
        .login_with(Credentials::token("from-env"), LoginOptions::session_only())
        .await
        .unwrap();

    assert_eq!(user.login, "octocat");
    assert!(harness.state.is_logged_in());
    assert!(harness.store.credentials().is_none());
    assert_eq!(names(&harness.state.repositories()), vec!["one", "two", "empty"]);

    // Nothing is selected or fetched until the caller decides
    assert!(harness.state.repository().is_none());
    assert_eq!(harness.gateway.calls("fetch_issues"), 0);

    let handle = harness.state.restore_repository().unwrap();
    handle.await.unwrap();
    assert_eq!(harness.state.repository().map(|r| r.id), Some(RepositoryId(2)));
    assert_eq!(harness.issue_numbers(), vec![7]);
    assert_eq!(harness.gateway.calls("fetch_issues"), 1);
}

#[tokio::test]
async fn test_rejected_session_only_login_keeps_stored_credentials() {
    let store = MemoryCredentialStore::new();
    store.save_credentials(&Credentials::token("saved")).unwrap();
    let harness = Harness::with_store(gateway(), Options::default(), store);
    harness.gateway.fail(
        "authenticate",
        IssueError::Authentication("Bad credentials".to_string()),
    );

    let result = harness
        .state
        .login_with(Credentials::token("expired"), LoginOptions::session_only())
        .await;

    assert!(matches!(result, Err(IssueError::Authentication(_))));
    assert!(!harness.state.is_logged_in());
    assert_eq!(harness.store.credentials(), Some(Credentials::token("saved")));
    assert_eq!(harness.gateway.calls("sign_out"), 1);
}

#[tokio::test]
async fn test_rejected_stored_credentials_are_cleared() {
    let store = MemoryCredentialStore::new();
    store.save_credentials(&Credentials::token("revoked")).unwrap();
    let harness = Harness::with_store(gateway(), Options::default(), store);
    harness.gateway.fail(
        "authenticate",
        IssueError::Authentication("Bad credentials".to_string()),
    );

    let result = harness
        .state
        .login_from_store_with(LoginOptions::session_only())
        .await;

    assert!(matches!(result, Err(IssueError::Authentication(_))));
    assert!(harness.store.credentials().is_none());
}

fn working_copy(remote: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    gix::init(dir.path()).unwrap();
    let config = dir.path().join(".git").join("config");
    let mut text = std::fs::read_to_string(&config).unwrap();
    text.push_str(&format!("[remote \"origin\"]\n\turl = {}\n", remote));
    std::fs::write(config, text).unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    dir
}

#[tokio::test]
async fn test_select_repository_for_path() {
    let harness = Harness::new(gateway());
    harness
        .state
        .login(Credentials::token("secret"))
        .await
        .unwrap();
    let checkout = working_copy("git@github.com:OctoCat/Two.git");

    let handle = harness
        .state
        .select_repository_for_path(&checkout.path().join("src"))
        .unwrap()
        .expect("the working copy matches a loaded repository");
    handle.await.unwrap();

    assert_eq!(harness.state.repository().map(|r| r.id), Some(RepositoryId(2)));
    assert_eq!(harness.issue_numbers(), vec![7]);

    // Selecting it again changes nothing
    assert!(
        harness
            .state
            .select_repository_for_path(checkout.path())
            .unwrap()
            .is_none()
    );

    let unknown = working_copy("https://github.com/someone/else.git");
    let err = harness
        .state
        .select_repository_for_path(unknown.path())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidLocalState);
    assert!(err.to_string().contains("someone/else"));
    assert_eq!(harness.state.repository().map(|r| r.id), Some(RepositoryId(2)));
}

#[tokio::test]
async fn test_auto_select_can_be_disabled() {
    let options = Options {
        disable_auto_select_repository: true,
        ..Options::default()
    };
    let harness = Harness::with_options(gateway(), options);
    harness
        .state
        .login(Credentials::token("secret"))
        .await
        .unwrap();
    let checkout = working_copy("https://github.com/octocat/two");

    assert!(
        harness
            .state
            .select_repository_for_path(checkout.path())
            .unwrap()
            .is_none()
    );
    assert_eq!(harness.state.repository().map(|r| r.id), Some(RepositoryId(1)));
}
