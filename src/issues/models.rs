//! Common domain models for GitHub issues
//!
//! This module contains the vendor-agnostic representation of the data the
//! issue browser works with. The gateway converts GitHub API payloads into
//! these types, so the rest of the crate never sees wire formats.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// A GitHub account (user or organization member)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Numeric account ID
    pub id: u64,

    /// Login name
    pub login: String,

    /// Avatar image URL, if GitHub returned one
    pub avatar_url: Option<String>,
}

/// Numeric repository identifier assigned by GitHub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(pub u64);

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A remote repository the user can browse issues for
///
/// Two references to the same repository compare equal even if mutable
/// fields such as `open_issues_count` differ between fetches: identity is the
/// numeric [`RepositoryId`] only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Repository ID (unique on GitHub)
    pub id: RepositoryId,

    /// Owner login (user or organization)
    pub owner: String,

    /// Repository name (without owner)
    pub name: String,

    /// Whether the issue tracker is enabled
    pub has_issues: bool,

    /// Number of open issues
    pub open_issues_count: u32,

    /// Whether the repository is private
    pub private: bool,
}

impl RepositoryRef {
    /// Returns `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Case-insensitive match against an owner and repository name
    pub fn matches(&self, owner: &str, name: &str) -> bool {
        self.owner.eq_ignore_ascii_case(owner) && self.name.eq_ignore_ascii_case(name)
    }
}

impl PartialEq for RepositoryRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RepositoryRef {}

impl Hash for RepositoryRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Open/closed state of an issue
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// A repository-scoped tag attachable to issues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name, unique within the repository
    pub name: String,

    /// Six hex digit color, without a leading `#`
    pub color: String,
}

impl Label {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// A repository-scoped grouping of issues with a target date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Milestone number, unique within the repository
    pub number: u64,

    /// Milestone title
    pub title: String,

    /// Optional description
    pub description: Option<String>,

    /// Optional due date
    pub due_on: Option<DateTime<Utc>>,

    /// Number of open issues in the milestone
    pub open_issues: u32,
}

/// A single reported item within a repository
///
/// Issues are only ever replaced wholesale by values returned from the
/// remote; filtering never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number, unique within the repository
    pub number: u64,

    /// Issue title
    pub title: String,

    /// Markdown body (empty when GitHub returned none)
    pub body: String,

    /// Open or closed
    pub state: IssueState,

    /// Assigned user, if any
    pub assignee: Option<User>,

    /// User who opened the issue
    pub reporter: User,

    /// Milestone the issue belongs to, if any
    pub milestone: Option<Milestone>,

    /// Attached labels (unique by name)
    pub labels: Vec<Label>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Number of comments
    pub comments: u32,
}

impl Issue {
    /// Returns true if a label with exactly this name is attached
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label.name == name)
    }
}

/// A comment posted on an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub body: String,
    pub user: User,
    pub created_at: DateTime<Utc>,
}

/// Draft of an issue to be created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    /// Login of the user to assign
    pub assignee: Option<String>,
    /// Milestone number
    pub milestone: Option<u64>,
    /// Label names
    pub labels: Vec<String>,
}

/// Partial update of an existing issue
///
/// `None` fields are left untouched by the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<IssueState>,
    pub assignee: Option<String>,
    pub milestone: Option<u64>,
    pub labels: Option<Vec<String>>,
}

impl IssueUpdate {
    /// An update that only changes the issue state
    pub fn state(state: IssueState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }
}

/// Server-side selection applied when listing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum IssueRequest {
    Open,
    Closed,
    All,
}

impl Default for IssueRequest {
    /// Only open issues are listed by default
    fn default() -> Self {
        IssueRequest::Open
    }
}

/// Login credentials or an access token
///
/// When `access_token` is non-empty it takes precedence over login/password.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub access_token: String,
}

impl Credentials {
    pub fn token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    pub fn basic(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            access_token: String::new(),
        }
    }

    pub fn has_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("access_token", &"<redacted>")
            .finish()
    }
}
