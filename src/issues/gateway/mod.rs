//! Remote GitHub access
//!
//! The issue state talks to GitHub exclusively through
//! [`RemoteGitHubGateway`], so it can be driven by the octocrab-backed
//! [`OctocrabGateway`] in production and by in-memory fakes in tests.

mod octocrab_client;

pub use octocrab_client::OctocrabGateway;

use async_trait::async_trait;

use super::error::IssueError;
use super::models::{
    Comment, Credentials, Issue, IssueRequest, IssueState, IssueUpdate, Label, Milestone,
    NewIssue, RepositoryRef, User,
};

/// Network operations against GitHub
///
/// Every call may fail with a network, authentication or remote rejection
/// error; implementations never panic on remote failures.
#[async_trait]
pub trait RemoteGitHubGateway: Send + Sync {
    /// Switches to `credentials` and returns the authenticated user
    async fn authenticate(&self, credentials: &Credentials) -> Result<User, IssueError>;

    /// Drops any credentials; later calls are anonymous
    fn sign_out(&self);

    /// Repositories of the current user followed by those of each of their organizations
    async fn fetch_repositories(&self) -> Result<Vec<RepositoryRef>, IssueError>;

    /// Looks up a single repository
    async fn fetch_repository(&self, owner: &str, name: &str)
    -> Result<RepositoryRef, IssueError>;

    async fn fetch_issues(
        &self,
        owner: &str,
        name: &str,
        request: IssueRequest,
    ) -> Result<Vec<Issue>, IssueError>;

    async fn fetch_labels(&self, owner: &str, name: &str) -> Result<Vec<Label>, IssueError>;

    async fn fetch_milestones(&self, owner: &str, name: &str)
    -> Result<Vec<Milestone>, IssueError>;

    async fn fetch_assignees(&self, repository: &RepositoryRef) -> Result<Vec<User>, IssueError>;

    async fn fetch_comments(
        &self,
        repository: &RepositoryRef,
        number: u64,
    ) -> Result<Vec<Comment>, IssueError>;

    async fn create_issue(
        &self,
        repository: &RepositoryRef,
        draft: &NewIssue,
    ) -> Result<Issue, IssueError>;

    async fn update_issue(
        &self,
        repository: &RepositoryRef,
        number: u64,
        patch: &IssueUpdate,
    ) -> Result<Issue, IssueError>;

    async fn add_comment(
        &self,
        repository: &RepositoryRef,
        number: u64,
        text: &str,
    ) -> Result<Comment, IssueError>;

    /// Opens or closes an issue
    async fn set_issue_state(
        &self,
        repository: &RepositoryRef,
        number: u64,
        state: IssueState,
    ) -> Result<Issue, IssueError> {
        self.update_issue(repository, number, &IssueUpdate::state(state))
            .await
    }
}
