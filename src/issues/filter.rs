//! Client-side issue and repository filtering
//!
//! Filters run over the issues already fetched for the selected repository;
//! changing a filter never goes back to the network. Every active predicate
//! must hold for an issue to be kept, and a disabled filter keeps everything.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::config::Options;
use super::models::{Issue, RepositoryRef, User};

/// Label selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelFilter {
    /// No label filtering
    #[default]
    All,
    /// Keep issues carrying a label with exactly this name
    Specific(String),
}

impl LabelFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        match self {
            LabelFilter::All => true,
            LabelFilter::Specific(name) => issue.has_label(name),
        }
    }
}

/// Milestone selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilestoneFilter {
    /// No milestone filtering
    #[default]
    All,
    /// Keep only issues without a milestone
    None,
    /// Keep issues in the milestone with this number
    Specific(u64),
}

impl MilestoneFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        match self {
            MilestoneFilter::All => true,
            MilestoneFilter::None => issue.milestone.is_none(),
            MilestoneFilter::Specific(number) => issue
                .milestone
                .as_ref()
                .is_some_and(|milestone| milestone.number == *number),
        }
    }
}

/// Which issues to show relative to the logged-in user
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum UserFilterKind {
    #[default]
    All,
    AssignedToMe,
    ReportedByMe,
    Unassigned,
}

impl UserFilterKind {
    /// Applies the filter for `user`; without a logged-in user every issue is kept
    pub fn matches(&self, issue: &Issue, user: Option<&User>) -> bool {
        let Some(user) = user else {
            return true;
        };

        match self {
            UserFilterKind::All => true,
            UserFilterKind::AssignedToMe => issue
                .assignee
                .as_ref()
                .is_some_and(|assignee| assignee.id == user.id),
            UserFilterKind::ReportedByMe => issue.reporter.id == user.id,
            UserFilterKind::Unassigned => issue.assignee.is_none(),
        }
    }
}

/// The user's current filter selections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub label: LabelFilter,
    pub milestone: MilestoneFilter,
    pub search_text: String,
    pub user: UserFilterKind,
}

impl FilterState {
    /// Case-insensitive substring match on title or body
    ///
    /// Blank or whitespace-only search text disables the search.
    pub fn matches_search(&self, issue: &Issue) -> bool {
        let needle = self.search_text.trim();
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        issue.title.to_lowercase().contains(&needle) || issue.body.to_lowercase().contains(&needle)
    }

    /// Returns true if the issue passes every active predicate
    pub fn matches(&self, issue: &Issue, user: Option<&User>) -> bool {
        self.label.matches(issue)
            && self.milestone.matches(issue)
            && self.user.matches(issue, user)
            && self.matches_search(issue)
    }

    /// Lazily filters `issues`, preserving their order
    pub fn apply<'a, I, T>(
        &'a self,
        issues: I,
        user: Option<&'a User>,
    ) -> impl Iterator<Item = T> + 'a
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
        T: AsRef<Issue> + 'a,
    {
        issues
            .into_iter()
            .filter(move |issue| self.matches(issue.as_ref(), user))
    }
}

impl AsRef<Issue> for Issue {
    fn as_ref(&self) -> &Issue {
        self
    }
}

/// Filters the repository picker list
///
/// Repositories with the issue tracker disabled are always dropped; with
/// `hide_repositories_with_no_issues` set, so are repositories with no open
/// issues.
pub fn filter_repositories(
    repositories: impl IntoIterator<Item = RepositoryRef>,
    options: &Options,
) -> impl Iterator<Item = RepositoryRef> {
    let hide_empty = options.hide_repositories_with_no_issues;
    repositories
        .into_iter()
        .filter(|repository| repository.has_issues)
        .filter(move |repository| !hide_empty || repository.open_issues_count > 0)
}
