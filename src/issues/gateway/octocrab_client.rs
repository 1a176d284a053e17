//! Octocrab-based GitHub gateway
//!
//! Lists and edits issues through octocrab's typed handlers and converts the
//! octocrab models into the common domain model.

use std::sync::RwLock;

use async_trait::async_trait;
use octocrab::models::issues::{Comment as OctocrabComment, Issue as OctocrabIssue};
use octocrab::models::orgs::Organization as OctocrabOrganization;
use octocrab::models::{
    Author, IssueState as OctocrabIssueState, Label as OctocrabLabel,
    Milestone as OctocrabMilestone, Repository as OctocrabRepository,
};
use octocrab::{Octocrab, Page, params};
use serde::Serialize;

use super::RemoteGitHubGateway;
use crate::issues::error::IssueError;
use crate::issues::models::{
    Comment, Credentials, Issue, IssueRequest, IssueState, IssueUpdate, Label, Milestone,
    NewIssue, RepositoryId, RepositoryRef, User,
};

/// GitHub's maximum page size
const PER_PAGE: u8 = 100;

/// Octocrab-backed [`RemoteGitHubGateway`]
pub struct OctocrabGateway {
    base_uri: String,
    client: RwLock<Octocrab>,
}

impl OctocrabGateway {
    /// Creates an anonymous gateway for the API at `base_uri`
    /// (e.g. `https://api.github.com`)
    pub fn new(base_uri: impl Into<String>) -> Result<Self, IssueError> {
        let base_uri = base_uri.into();
        let client = Self::build_client(&base_uri, None)?;
        Ok(Self {
            base_uri,
            client: RwLock::new(client),
        })
    }

    /// Creates a gateway already authenticated with a personal access token
    pub fn with_token(base_uri: impl Into<String>, token: String) -> Result<Self, IssueError> {
        let base_uri = base_uri.into();
        let client = Self::build_client(&base_uri, Some(&Credentials::token(token)))?;
        Ok(Self {
            base_uri,
            client: RwLock::new(client),
        })
    }

    fn build_client(
        base_uri: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Octocrab, IssueError> {
        let mut builder = Octocrab::builder().base_uri(base_uri).map_err(|e| {
            IssueError::Configuration(format!("Invalid GitHub API URL {}: {}", base_uri, e))
        })?;

        if let Some(credentials) = credentials {
            builder = if credentials.has_token() {
                builder.personal_token(credentials.access_token.clone())
            } else {
                builder.basic_auth(credentials.login.clone(), credentials.password.clone())
            };
        }

        builder
            .build()
            .map_err(|e| IssueError::Configuration(format!("Failed to create octocrab client: {}", e)))
    }

    fn client(&self) -> Octocrab {
        self.client
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace_client(&self, client: Octocrab) {
        *self
            .client
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = client;
    }
}

#[async_trait]
impl RemoteGitHubGateway for OctocrabGateway {
    async fn authenticate(&self, credentials: &Credentials) -> Result<User, IssueError> {
        let client = Self::build_client(&self.base_uri, Some(credentials))?;
        let user = client.current().user().await?;
        tracing::info!("Authenticated with GitHub as {}", user.login);
        self.replace_client(client);
        Ok(convert_user(user))
    }

    fn sign_out(&self) {
        match Self::build_client(&self.base_uri, None) {
            Ok(client) => self.replace_client(client),
            Err(e) => tracing::error!("Failed to reset GitHub client: {}", e),
        }
    }

    async fn fetch_repositories(&self) -> Result<Vec<RepositoryRef>, IssueError> {
        tracing::info!("Fetching repositories for current user");
        let client = self.client();
        let page = client
            .current()
            .list_repos_for_authenticated_user()
            .per_page(PER_PAGE)
            .send()
            .await?;
        let mut repositories = client.all_pages(page).await?;

        // octocrab has no handler for the organizations of the current user
        let page: Page<OctocrabOrganization> = client
            .get("/user/orgs", Some(&PageParams { per_page: PER_PAGE }))
            .await?;
        let organizations = client.all_pages(page).await?;

        for organization in organizations {
            tracing::debug!("Fetching repositories for organization {}", organization.login);
            let page = client
                .orgs(organization.login.as_str())
                .list_repos()
                .per_page(PER_PAGE)
                .send()
                .await?;
            repositories.extend(client.all_pages(page).await?);
        }

        Ok(repositories.into_iter().map(convert_repository).collect())
    }

    async fn fetch_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositoryRef, IssueError> {
        let repository = self.client().repos(owner, name).get().await?;
        Ok(convert_repository(repository))
    }

    async fn fetch_issues(
        &self,
        owner: &str,
        name: &str,
        request: IssueRequest,
    ) -> Result<Vec<Issue>, IssueError> {
        let client = self.client();
        let state = match request {
            IssueRequest::Open => params::State::Open,
            IssueRequest::Closed => params::State::Closed,
            IssueRequest::All => params::State::All,
        };
        let page = client
            .issues(owner, name)
            .list()
            .state(state)
            .per_page(PER_PAGE)
            .send()
            .await?;
        let issues = client.all_pages(page).await?;

        // The issues endpoint also lists pull requests
        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(convert_issue)
            .collect())
    }

    async fn fetch_labels(&self, owner: &str, name: &str) -> Result<Vec<Label>, IssueError> {
        let client = self.client();
        let page = client
            .issues(owner, name)
            .list_labels_for_repo()
            .per_page(PER_PAGE)
            .send()
            .await?;
        let labels = client.all_pages(page).await?;
        Ok(labels.into_iter().map(convert_label).collect())
    }

    async fn fetch_milestones(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<Milestone>, IssueError> {
        let client = self.client();
        // octocrab has no milestone list handler
        let route = format!("/repos/{}/{}/milestones", owner, name);
        let params = MilestoneParams {
            state: "open",
            per_page: PER_PAGE,
        };
        let page: Page<OctocrabMilestone> = client.get(route, Some(&params)).await?;
        let milestones = client.all_pages(page).await?;
        Ok(milestones.into_iter().map(convert_milestone).collect())
    }

    async fn fetch_assignees(&self, repository: &RepositoryRef) -> Result<Vec<User>, IssueError> {
        let client = self.client();
        let page = client
            .issues(repository.owner.as_str(), repository.name.as_str())
            .list_assignees()
            .per_page(PER_PAGE)
            .send()
            .await?;
        let users = client.all_pages(page).await?;
        Ok(users.into_iter().map(convert_user).collect())
    }

    async fn fetch_comments(
        &self,
        repository: &RepositoryRef,
        number: u64,
    ) -> Result<Vec<Comment>, IssueError> {
        let client = self.client();
        let page = client
            .issues(repository.owner.as_str(), repository.name.as_str())
            .list_comments(number)
            .per_page(PER_PAGE)
            .send()
            .await?;
        let comments = client.all_pages(page).await?;
        Ok(comments.into_iter().map(convert_comment).collect())
    }

    async fn create_issue(
        &self,
        repository: &RepositoryRef,
        draft: &NewIssue,
    ) -> Result<Issue, IssueError> {
        let client = self.client();
        let labels = (!draft.labels.is_empty()).then(|| draft.labels.clone());
        let assignees = draft.assignee.clone().map(|login| vec![login]);
        let issue = client
            .issues(repository.owner.as_str(), repository.name.as_str())
            .create(draft.title.as_str())
            .body(draft.body.as_str())
            .milestone(draft.milestone)
            .labels(labels)
            .assignees(assignees)
            .send()
            .await?;
        Ok(convert_issue(issue))
    }

    async fn update_issue(
        &self,
        repository: &RepositoryRef,
        number: u64,
        patch: &IssueUpdate,
    ) -> Result<Issue, IssueError> {
        let client = self.client();
        let handler = client.issues(repository.owner.as_str(), repository.name.as_str());
        let assignees = patch.assignee.clone().map(|login| vec![login]);

        let mut update = handler.update(number);
        if let Some(title) = patch.title.as_deref() {
            update = update.title(title);
        }
        if let Some(body) = patch.body.as_deref() {
            update = update.body(body);
        }
        if let Some(state) = patch.state {
            update = update.state(match state {
                IssueState::Open => OctocrabIssueState::Open,
                IssueState::Closed => OctocrabIssueState::Closed,
            });
        }
        if let Some(assignees) = &assignees {
            update = update.assignees(assignees.as_slice());
        }
        if let Some(milestone) = patch.milestone {
            update = update.milestone(milestone);
        }
        if let Some(labels) = &patch.labels {
            update = update.labels(labels.as_slice());
        }

        let issue = update.send().await?;
        Ok(convert_issue(issue))
    }

    async fn add_comment(
        &self,
        repository: &RepositoryRef,
        number: u64,
        text: &str,
    ) -> Result<Comment, IssueError> {
        let comment = self
            .client()
            .issues(repository.owner.as_str(), repository.name.as_str())
            .create_comment(number, text)
            .await?;
        Ok(convert_comment(comment))
    }
}

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u8,
}

#[derive(Debug, Serialize)]
struct MilestoneParams<'a> {
    state: &'a str,
    per_page: u8,
}

fn convert_user(author: Author) -> User {
    User {
        id: author.id.0,
        login: author.login,
        avatar_url: Some(author.avatar_url.to_string()),
    }
}

fn convert_repository(repository: OctocrabRepository) -> RepositoryRef {
    RepositoryRef {
        id: RepositoryId(repository.id.0),
        owner: repository
            .owner
            .map(|owner| owner.login)
            .unwrap_or_default(),
        name: repository.name,
        has_issues: repository.has_issues.unwrap_or(false),
        open_issues_count: repository.open_issues_count.unwrap_or(0) as u32,
        private: repository.private.unwrap_or(false),
    }
}

fn convert_label(label: OctocrabLabel) -> Label {
    Label {
        name: label.name,
        color: label.color,
    }
}

fn convert_milestone(milestone: OctocrabMilestone) -> Milestone {
    Milestone {
        number: milestone.number as u64,
        title: milestone.title,
        description: milestone.description,
        due_on: milestone.due_on,
        open_issues: milestone.open_issues.unwrap_or(0) as u32,
    }
}

fn convert_issue(issue: OctocrabIssue) -> Issue {
    Issue {
        number: issue.number,
        title: issue.title,
        body: issue.body.unwrap_or_default(),
        state: match issue.state {
            OctocrabIssueState::Closed => IssueState::Closed,
            _ => IssueState::Open,
        },
        assignee: issue.assignee.map(convert_user),
        reporter: convert_user(issue.user),
        milestone: issue.milestone.map(convert_milestone),
        labels: issue.labels.into_iter().map(convert_label).collect(),
        created_at: issue.created_at,
        comments: issue.comments as u32,
    }
}

fn convert_comment(comment: OctocrabComment) -> Comment {
    Comment {
        id: comment.id.0,
        body: comment.body.unwrap_or_default(),
        user: convert_user(comment.user),
        created_at: comment.created_at,
    }
}
