//! Shared fixtures for the issue state integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use gitissues::issues::{
    Comment, CredentialStore, Credentials, ErrorReporter, Issue, IssueError,
    IssueRepositoryState, IssueRequest, IssueState, IssueUpdate, Label, MemoryCredentialStore,
    Milestone, NewIssue, Options, RemoteGitHubGateway, RepositoryId, RepositoryRef,
    StaticOptions, User,
};

pub fn user(id: u64, login: &str) -> User {
    User {
        id,
        login: login.to_string(),
        avatar_url: None,
    }
}

pub fn me() -> User {
    user(1, "octocat")
}

pub fn repository(id: u64, name: &str, open_issues_count: u32) -> RepositoryRef {
    RepositoryRef {
        id: RepositoryId(id),
        owner: "octocat".to_string(),
        name: name.to_string(),
        has_issues: true,
        open_issues_count,
        private: false,
    }
}

pub fn milestone(number: u64) -> Milestone {
    Milestone {
        number,
        title: format!("Milestone {}", number),
        description: None,
        due_on: None,
        open_issues: 1,
    }
}

pub fn issue(number: u64, title: &str, body: &str) -> Issue {
    Issue {
        number,
        title: title.to_string(),
        body: body.to_string(),
        state: IssueState::Open,
        assignee: None,
        reporter: user(2, "hubot"),
        milestone: None,
        labels: vec![],
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        comments: 0,
    }
}

/// The three issues used by the filter scenarios
pub fn scenario_issues() -> Vec<Issue> {
    let mut one = issue(1, "Title one", "Body one");
    one.labels = vec![Label::new("One", "ff0000")];
    one.milestone = Some(milestone(1));

    let mut two = issue(2, "Two", "Two");
    two.milestone = Some(milestone(2));

    let three = issue(3, "Three", "Three");

    vec![one, two, three]
}

pub fn comment(id: u64, login: &str, body: &str) -> Comment {
    Comment {
        id,
        body: body.to_string(),
        user: user(3, login),
        created_at: Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 0).unwrap(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepositoryData {
    pub labels: Vec<Label>,
    pub milestones: Vec<Milestone>,
    pub issues: Vec<Issue>,
    pub comments: HashMap<u64, Vec<Comment>>,
    pub assignees: Vec<User>,
}

/// In-memory gateway with call counters, injectable failures and holds
///
/// Calls are counted by method name (`"fetch_issues"`, ...). A hold keyed by
/// `"<method>:<owner>/<name>"` parks the call until the returned `Notify` is
/// signalled.
pub struct MockGateway {
    user: User,
    repositories: Mutex<Vec<RepositoryRef>>,
    data: Mutex<HashMap<String, RepositoryData>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, IssueError>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    next_id: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            user: me(),
            repositories: Mutex::new(Vec::new()),
            data: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(100),
        }
    }

    pub fn with_repositories(self, repositories: Vec<RepositoryRef>) -> Self {
        *self.repositories.lock().unwrap() = repositories;
        self
    }

    pub fn with_data(self, repository: &RepositoryRef, data: RepositoryData) -> Self {
        self.data
            .lock()
            .unwrap()
            .insert(repository.full_name(), data);
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn fail(&self, method: &'static str, error: IssueError) {
        self.failures.lock().unwrap().insert(method, error);
    }

    pub fn recover(&self, method: &'static str) {
        self.failures.lock().unwrap().remove(method);
    }

    pub fn hold(&self, method: &str, repository: &RepositoryRef) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.holds.lock().unwrap().insert(
            format!("{}:{}", method, repository.full_name()),
            Arc::clone(&notify),
        );
        notify
    }

    /// Waits until `method` has been called at least `count` times
    pub async fn wait_for_calls(&self, method: &str, count: usize) {
        while self.calls(method) < count {
            tokio::task::yield_now().await;
        }
    }

    async fn enter(&self, method: &'static str, full_name: &str) -> Result<(), IssueError> {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;

        let hold = self
            .holds
            .lock()
            .unwrap()
            .remove(&format!("{}:{}", method, full_name));
        if let Some(hold) = hold {
            hold.notified().await;
        }

        match self.failures.lock().unwrap().get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn with_repository<R>(&self, full_name: &str, f: impl FnOnce(&mut RepositoryData) -> R) -> R {
        let mut data = self.data.lock().unwrap();
        f(data.entry(full_name.to_string()).or_default())
    }
}

#[async_trait]
impl RemoteGitHubGateway for MockGateway {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<User, IssueError> {
        self.enter("authenticate", "").await?;
        Ok(self.user.clone())
    }

    fn sign_out(&self) {
        *self.calls.lock().unwrap().entry("sign_out").or_default() += 1;
    }

    async fn fetch_repositories(&self) -> Result<Vec<RepositoryRef>, IssueError> {
        self.enter("fetch_repositories", "").await?;
        Ok(self.repositories.lock().unwrap().clone())
    }

    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<RepositoryRef, IssueError> {
        self.enter("fetch_repository", &format!("{}/{}", owner, name))
            .await?;
        self.repositories
            .lock()
            .unwrap()
            .iter()
            .find(|repository| repository.matches(owner, name))
            .cloned()
            .ok_or_else(|| IssueError::RemoteRejection {
                status: 404,
                message: "Not Found".to_string(),
            })
    }

    async fn fetch_issues(
        &self,
        owner: &str,
        name: &str,
        request: IssueRequest,
    ) -> Result<Vec<Issue>, IssueError> {
        let full_name = format!("{}/{}", owner, name);
        self.enter("fetch_issues", &full_name).await?;
        Ok(self.with_repository(&full_name, |data| {
            data.issues
                .iter()
                .filter(|issue| match request {
                    IssueRequest::Open => issue.state == IssueState::Open,
                    IssueRequest::Closed => issue.state == IssueState::Closed,
                    IssueRequest::All => true,
                })
                .cloned()
                .collect()
        }))
    }

    async fn fetch_labels(&self, owner: &str, name: &str) -> Result<Vec<Label>, IssueError> {
        let full_name = format!("{}/{}", owner, name);
        self.enter("fetch_labels", &full_name).await?;
        Ok(self.with_repository(&full_name, |data| data.labels.clone()))
    }

    async fn fetch_milestones(&self, owner: &str, name: &str) -> Result<Vec<Milestone>, IssueError> {
        let full_name = format!("{}/{}", owner, name);
        self.enter("fetch_milestones", &full_name).await?;
        Ok(self.with_repository(&full_name, |data| data.milestones.clone()))
    }

    async fn fetch_assignees(&self, repository: &RepositoryRef) -> Result<Vec<User>, IssueError> {
        let full_name = repository.full_name();
        self.enter("fetch_assignees", &full_name).await?;
        Ok(self.with_repository(&full_name, |data| data.assignees.clone()))
    }

    async fn fetch_comments(
        &self,
        repository: &RepositoryRef,
        number: u64,
    ) -> Result<Vec<Comment>, IssueError> {
        let full_name = repository.full_name();
        self.enter("fetch_comments", &full_name).await?;
        Ok(self.with_repository(&full_name, |data| {
            data.comments.get(&number).cloned().unwrap_or_default()
        }))
    }

    async fn create_issue(
        &self,
        repository: &RepositoryRef,
        draft: &NewIssue,
    ) -> Result<Issue, IssueError> {
        let full_name = repository.full_name();
        self.enter("create_issue", &full_name).await?;

        let mut created = issue(
            self.next_id.fetch_add(1, Ordering::SeqCst),
            &draft.title,
            &draft.body,
        );
        created.reporter = self.user.clone();
        created.labels = draft
            .labels
            .iter()
            .map(|name| Label::new(name.clone(), "ededed"))
            .collect();
        created.milestone = draft.milestone.map(milestone);

        self.with_repository(&full_name, |data| data.issues.push(created.clone()));
        Ok(created)
    }

    async fn update_issue(
        &self,
        repository: &RepositoryRef,
        number: u64,
        patch: &IssueUpdate,
    ) -> Result<Issue, IssueError> {
        let full_name = repository.full_name();
        self.enter("update_issue", &full_name).await?;

        self.with_repository(&full_name, |data| {
            let existing = data
                .issues
                .iter_mut()
                .find(|issue| issue.number == number)
                .ok_or_else(|| IssueError::RemoteRejection {
                    status: 404,
                    message: "Not Found".to_string(),
                })?;
            if let Some(title) = &patch.title {
                existing.title = title.clone();
            }
            if let Some(body) = &patch.body {
                existing.body = body.clone();
            }
            if let Some(state) = patch.state {
                existing.state = state;
            }
            if let Some(labels) = &patch.labels {
                existing.labels = labels
                    .iter()
                    .map(|name| Label::new(name.clone(), "ededed"))
                    .collect();
            }
            if let Some(milestone_number) = patch.milestone {
                existing.milestone = Some(milestone(milestone_number));
            }
            Ok(existing.clone())
        })
    }

    async fn add_comment(
        &self,
        repository: &RepositoryRef,
        number: u64,
        text: &str,
    ) -> Result<Comment, IssueError> {
        let full_name = repository.full_name();
        self.enter("add_comment", &full_name).await?;

        let posted = Comment {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            body: text.to_string(),
            user: self.user.clone(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        };
        self.with_repository(&full_name, |data| {
            data.comments.entry(number).or_default().push(posted.clone())
        });
        Ok(posted)
    }
}

/// Collects every reported failure
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, Option<IssueError>)>>,
}

impl RecordingReporter {
    pub fn messages(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<IssueError> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, error)| error.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, message: &str, error: Option<&IssueError>) {
        self.reports
            .lock()
            .unwrap()
            .push((message.to_string(), error.cloned()));
    }
}

/// An issue state wired to test doubles
pub struct Harness {
    pub state: IssueRepositoryState,
    pub gateway: Arc<MockGateway>,
    pub store: Arc<MemoryCredentialStore>,
    pub reporter: Arc<RecordingReporter>,
}

impl Harness {
    pub fn new(gateway: MockGateway) -> Self {
        Self::with_options(gateway, Options::default())
    }

    pub fn with_options(gateway: MockGateway, options: Options) -> Self {
        Self::with_store(gateway, options, MemoryCredentialStore::new())
    }

    pub fn with_store(gateway: MockGateway, options: Options, store: MemoryCredentialStore) -> Self {
        let gateway = Arc::new(gateway);
        let store = Arc::new(store);
        let reporter = Arc::new(RecordingReporter::default());
        let state = IssueRepositoryState::builder()
            .gateway(gateway.clone())
            .store(store.clone())
            .reporter(reporter.clone())
            .options(Arc::new(StaticOptions(options)))
            .build()
            .expect("all collaborators provided");

        Self {
            state,
            gateway,
            store,
            reporter,
        }
    }

    /// Selects `repository` and waits for its labels, milestones and issues
    pub async fn select(&self, repository: &RepositoryRef) {
        if let Some(handle) = self.state.set_repository(Some(repository.clone())) {
            handle.await.expect("refresh task panicked");
        }
    }

    pub fn issue_numbers(&self) -> Vec<u64> {
        self.state.issues().iter().map(|issue| issue.number).collect()
    }

    pub fn stored_repository(&self) -> Option<RepositoryId> {
        self.store.selected_repository_id()
    }
}
