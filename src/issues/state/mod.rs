//! Observable issue state for the selected repository
//!
//! [`IssueRepositoryState`] owns the issues, labels and milestones fetched for
//! the currently selected repository together with the user's filter
//! selections, and exposes the filtered issue view derived from them.
//!
//! ## Refresh protocol
//!
//! Selecting a different repository clears every repository-scoped
//! collection synchronously, then fetches labels, milestones and issues
//! concurrently on the tokio runtime. Each selection bumps a generation
//! counter; a fetch whose generation is no longer current when it completes
//! is discarded. At most one fetch per collection and generation is in flight;
//! further requests are dropped, not queued.
//!
//! Filter changes never touch the network: [`IssueRepositoryState::issues`]
//! recomputes the view from the fetched issues on every call.
//!
//! ## Change notifications
//!
//! ```no_run
//! # async fn example(state: gitissues::issues::IssueRepositoryState) {
//! use gitissues::issues::StateEvent;
//!
//! let mut events = state.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if event == StateEvent::IssuesChanged {
//!         println!("{} issues visible", state.issues().len());
//!     }
//! }
//! # }
//! ```

mod mutations;
mod session;
mod sync;

pub use session::LoginOptions;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use strum::Display;
use tokio::sync::broadcast;

use super::config::{OptionsProvider, StaticOptions};
use super::credentials::CredentialStore;
use super::error::IssueError;
use super::filter::{FilterState, LabelFilter, MilestoneFilter, UserFilterKind};
use super::gateway::RemoteGitHubGateway;
use super::models::{Comment, Issue, Label, Milestone, RepositoryId, RepositoryRef, User};
use super::reporter::{ErrorReporter, TracingErrorReporter};

const EVENT_CAPACITY: usize = 64;

/// Change notifications emitted by [`IssueRepositoryState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StateEvent {
    LoggedInChanged,
    UserChanged,
    RepositoriesChanged,
    RepositoryChanged,
    LabelsChanged,
    MilestonesChanged,
    /// The filtered issue view must be re-read
    IssuesChanged,
    FilterChanged,
    SelectedIssueChanged,
    IssueMarkdownChanged,
}

/// Repository-scoped collections with their own fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
enum Collection {
    Labels,
    Milestones,
    Issues,
}

/// In-flight guards, keyed by the selection generation that started the fetch
#[derive(Debug, Default)]
struct InFlight {
    labels: Option<u64>,
    milestones: Option<u64>,
    issues: Option<u64>,
}

impl InFlight {
    fn slot(&mut self, collection: Collection) -> &mut Option<u64> {
        match collection {
            Collection::Labels => &mut self.labels,
            Collection::Milestones => &mut self.milestones,
            Collection::Issues => &mut self.issues,
        }
    }

    /// Returns false if a fetch for the same generation is outstanding
    fn try_begin(&mut self, collection: Collection, generation: u64) -> bool {
        let slot = self.slot(collection);
        if *slot == Some(generation) {
            return false;
        }
        *slot = Some(generation);
        true
    }

    fn finish(&mut self, collection: Collection, generation: u64) {
        let slot = self.slot(collection);
        if *slot == Some(generation) {
            *slot = None;
        }
    }
}

/// Loaded repositories, indexed by id in discovery order
#[derive(Debug, Default)]
struct RepositoryIndex {
    order: Vec<RepositoryId>,
    by_id: HashMap<RepositoryId, RepositoryRef>,
}

impl RepositoryIndex {
    /// Adds a repository; the first occurrence of an id wins
    fn insert(&mut self, repository: RepositoryRef) -> bool {
        if self.by_id.contains_key(&repository.id) {
            return false;
        }
        self.order.push(repository.id);
        self.by_id.insert(repository.id, repository);
        true
    }

    fn get(&self, id: RepositoryId) -> Option<&RepositoryRef> {
        self.by_id.get(&id)
    }

    fn find(&self, owner: &str, name: &str) -> Option<&RepositoryRef> {
        self.iter().find(|repository| repository.matches(owner, name))
    }

    fn first(&self) -> Option<&RepositoryRef> {
        self.order.first().and_then(|id| self.by_id.get(id))
    }

    fn iter(&self) -> impl Iterator<Item = &RepositoryRef> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    fn clear(&mut self) {
        self.order.clear();
        self.by_id.clear();
    }
}

#[derive(Debug, Default)]
struct Inner {
    user: Option<User>,
    logged_in: bool,
    repositories: RepositoryIndex,
    repository: Option<RepositoryRef>,
    generation: u64,
    all_issues: Vec<Arc<Issue>>,
    labels: Vec<Label>,
    milestones: Vec<Milestone>,
    filter: FilterState,
    selected_issue: Option<Arc<Issue>>,
    issue_markdown: String,
    in_flight: InFlight,
}

impl Inner {
    /// Drops everything scoped to the selected repository
    fn clear_repository_data(&mut self) {
        self.all_issues.clear();
        self.labels.clear();
        self.milestones.clear();
        self.filter.label = LabelFilter::All;
        self.filter.milestone = MilestoneFilter::All;
        self.selected_issue = None;
        self.issue_markdown.clear();
    }
}

struct Shared {
    gateway: Arc<dyn RemoteGitHubGateway>,
    store: Arc<dyn CredentialStore>,
    reporter: Arc<dyn ErrorReporter>,
    options: Arc<dyn OptionsProvider>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<StateEvent>,
}

/// Issue state for the selected repository
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct IssueRepositoryState {
    shared: Arc<Shared>,
}

/// Builder for [`IssueRepositoryState`]
///
/// The gateway and credential store are required; the reporter defaults to
/// [`TracingErrorReporter`] and the options to all-off.
#[derive(Default)]
pub struct IssueRepositoryStateBuilder {
    gateway: Option<Arc<dyn RemoteGitHubGateway>>,
    store: Option<Arc<dyn CredentialStore>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    options: Option<Arc<dyn OptionsProvider>>,
}

impl IssueRepositoryStateBuilder {
    pub fn gateway(mut self, gateway: Arc<dyn RemoteGitHubGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn options(mut self, options: Arc<dyn OptionsProvider>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn build(self) -> Result<IssueRepositoryState, IssueError> {
        let gateway = self.gateway.ok_or_else(|| {
            IssueError::Configuration("A GitHub gateway is required".to_string())
        })?;
        let store = self.store.ok_or_else(|| {
            IssueError::Configuration("A credential store is required".to_string())
        })?;
        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(TracingErrorReporter));
        let options = self
            .options
            .unwrap_or_else(|| Arc::new(StaticOptions::default()));

        Ok(IssueRepositoryState::new(gateway, store, reporter, options))
    }
}

impl IssueRepositoryState {
    pub fn new(
        gateway: Arc<dyn RemoteGitHubGateway>,
        store: Arc<dyn CredentialStore>,
        reporter: Arc<dyn ErrorReporter>,
        options: Arc<dyn OptionsProvider>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                gateway,
                store,
                reporter,
                options,
                inner: Mutex::new(Inner::default()),
                events,
            }),
        }
    }

    pub fn builder() -> IssueRepositoryStateBuilder {
        IssueRepositoryStateBuilder::default()
    }

    /// Subscribes to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.shared.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, events: &[StateEvent]) {
        for event in events {
            // No subscribers is fine
            let _ = self.shared.events.send(*event);
        }
    }

    fn report_failure(&self, message: &str, err: &IssueError) {
        self.shared.reporter.report(message, Some(err));
    }

    fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// The selected repository and its generation, or the "no repository" guard error
    fn require_selection(&self) -> Result<(RepositoryRef, u64), IssueError> {
        let inner = self.lock();
        match &inner.repository {
            Some(repository) => Ok((repository.clone(), inner.generation)),
            None => {
                tracing::debug!("Ignoring repository operation: no repository selected");
                Err(IssueError::no_repository())
            }
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().logged_in
    }

    pub fn user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    /// Loaded repositories in discovery order
    pub fn repositories(&self) -> Vec<RepositoryRef> {
        self.lock().repositories.iter().cloned().collect()
    }

    pub fn repository(&self) -> Option<RepositoryRef> {
        self.lock().repository.clone()
    }

    /// Every fetched issue, unfiltered, most recently touched first
    pub fn all_issues(&self) -> Vec<Arc<Issue>> {
        self.lock().all_issues.clone()
    }

    /// The filtered issue view
    ///
    /// Recomputed from the fetched issues, the filter selections and the
    /// current user on every call.
    pub fn issues(&self) -> Vec<Arc<Issue>> {
        let inner = self.lock();
        inner
            .filter
            .apply(inner.all_issues.iter(), inner.user.as_ref())
            .cloned()
            .collect()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.lock().labels.clone()
    }

    pub fn milestones(&self) -> Vec<Milestone> {
        self.lock().milestones.clone()
    }

    /// Label picker entries: "all labels" followed by each fetched label
    pub fn label_choices(&self) -> Vec<LabelFilter> {
        let inner = self.lock();
        std::iter::once(LabelFilter::All)
            .chain(
                inner
                    .labels
                    .iter()
                    .map(|label| LabelFilter::Specific(label.name.clone())),
            )
            .collect()
    }

    /// Milestone picker entries: "all milestones", "no milestone", then each fetched milestone
    pub fn milestone_choices(&self) -> Vec<MilestoneFilter> {
        let inner = self.lock();
        [MilestoneFilter::All, MilestoneFilter::None]
            .into_iter()
            .chain(
                inner
                    .milestones
                    .iter()
                    .map(|milestone| MilestoneFilter::Specific(milestone.number)),
            )
            .collect()
    }

    pub fn filter(&self) -> FilterState {
        self.lock().filter.clone()
    }

    pub fn selected_issue(&self) -> Option<Arc<Issue>> {
        self.lock().selected_issue.clone()
    }

    /// Markdown of the selected issue: its body followed by its comments
    pub fn issue_markdown(&self) -> String {
        self.lock().issue_markdown.clone()
    }

    fn update_filter(&self, change: impl FnOnce(&mut FilterState)) {
        let changed = {
            let mut inner = self.lock();
            let before = inner.filter.clone();
            change(&mut inner.filter);
            inner.filter != before
        };
        if changed {
            self.emit(&[StateEvent::FilterChanged, StateEvent::IssuesChanged]);
        }
    }

    pub fn set_label_filter(&self, label: LabelFilter) {
        self.update_filter(|filter| filter.label = label);
    }

    pub fn set_milestone_filter(&self, milestone: MilestoneFilter) {
        self.update_filter(|filter| filter.milestone = milestone);
    }

    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.update_filter(|filter| filter.search_text = text);
    }

    pub fn set_user_filter(&self, kind: UserFilterKind) {
        self.update_filter(|filter| filter.user = kind);
    }
}

/// Renders an issue body followed by its comments
pub fn render_issue_markdown(issue: &Issue, comments: &[Comment]) -> String {
    let mut markdown = issue.body.clone();
    for comment in comments {
        append_comment_markdown(&mut markdown, comment);
    }
    markdown
}

fn append_comment_markdown(markdown: &mut String, comment: &Comment) {
    if !markdown.is_empty() {
        markdown.push_str("\n\n---\n\n");
    }
    markdown.push_str(&format!(
        "**{}** commented on {}\n\n{}",
        comment.user.login,
        comment.created_at.format("%Y-%m-%d %H:%M"),
        comment.body
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::models::IssueState;
    use chrono::TimeZone;

    fn user(login: &str) -> User {
        User {
            id: 1,
            login: login.to_string(),
            avatar_url: None,
        }
    }

    #[test]
    fn test_in_flight_is_per_generation() {
        let mut in_flight = InFlight::default();
        assert!(in_flight.try_begin(Collection::Issues, 1));
        assert!(!in_flight.try_begin(Collection::Issues, 1));
        // Other collections are independent
        assert!(in_flight.try_begin(Collection::Labels, 1));

        // A newer selection is never blocked by a stale fetch
        assert!(in_flight.try_begin(Collection::Issues, 2));
        // The stale fetch finishing does not release the newer guard
        in_flight.finish(Collection::Issues, 1);
        assert!(!in_flight.try_begin(Collection::Issues, 2));
        in_flight.finish(Collection::Issues, 2);
        assert!(in_flight.try_begin(Collection::Issues, 2));
    }

    #[test]
    fn test_repository_index_first_occurrence_wins() {
        let repository = |id: u64, name: &str| RepositoryRef {
            id: RepositoryId(id),
            owner: "octocat".to_string(),
            name: name.to_string(),
            has_issues: true,
            open_issues_count: 1,
            private: false,
        };
        let mut index = RepositoryIndex::default();
        assert!(index.insert(repository(2, "b")));
        assert!(index.insert(repository(1, "a")));
        assert!(!index.insert(repository(2, "duplicate")));

        let names: Vec<String> = index.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(index.first().map(|r| r.id), Some(RepositoryId(2)));
        assert_eq!(index.get(RepositoryId(2)).map(|r| r.name.as_str()), Some("b"));
        assert!(index.find("OCTOCAT", "A").is_some());
    }

    #[test]
    fn test_render_issue_markdown() {
        let created_at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let issue = Issue {
            number: 1,
            title: "title".to_string(),
            body: "##body##".to_string(),
            state: IssueState::Open,
            assignee: None,
            reporter: user("reporter"),
            milestone: None,
            labels: vec![],
            created_at,
            comments: 1,
        };
        let comment = Comment {
            id: 10,
            body: "Looks good".to_string(),
            user: user("reviewer"),
            created_at,
        };

        let markdown = render_issue_markdown(&issue, &[comment]);
        assert_eq!(
            markdown,
            "##body##\n\n---\n\n**reviewer** commented on 2024-05-01 12:30\n\nLooks good"
        );
        assert_eq!(render_issue_markdown(&issue, &[]), "##body##");
    }
}
