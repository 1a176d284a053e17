//! Issue creation, editing, closing and comments

use std::sync::Arc;

use super::{IssueRepositoryState, StateEvent, append_comment_markdown, render_issue_markdown};
use crate::issues::error::IssueError;
use crate::issues::models::{
    Comment, Issue, IssueState, IssueUpdate, NewIssue, RepositoryRef, User,
};

impl IssueRepositoryState {
    /// Creates an issue in the selected repository
    ///
    /// On success the new issue is placed first in [`all_issues`] and
    /// selected. On failure the error is reported and returned and the
    /// loaded issues are left untouched; the caller keeps its draft.
    ///
    /// [`all_issues`]: IssueRepositoryState::all_issues
    pub async fn add_issue(&self, draft: NewIssue) -> Result<Arc<Issue>, IssueError> {
        let (repository, generation) = self.require_selection()?;

        tracing::info!("Creating issue '{}' in {}", draft.title, repository.full_name());
        match self.shared.gateway.create_issue(&repository, &draft).await {
            Ok(issue) => Ok(self.upsert_issue(&repository, generation, issue).await),
            Err(e) => {
                self.report_failure(
                    &format!("Failed to create issue in {}", repository.full_name()),
                    &e,
                );
                Err(e)
            }
        }
    }

    /// Applies `patch` to issue `number` and moves it to the front
    pub async fn update_issue(
        &self,
        number: u64,
        patch: IssueUpdate,
    ) -> Result<Arc<Issue>, IssueError> {
        let (repository, generation) = self.require_selection()?;

        tracing::info!("Updating issue #{} in {}", number, repository.full_name());
        match self
            .shared
            .gateway
            .update_issue(&repository, number, &patch)
            .await
        {
            Ok(issue) => Ok(self.upsert_issue(&repository, generation, issue).await),
            Err(e) => {
                self.report_failure(
                    &format!("Failed to update issue #{} in {}", number, repository.full_name()),
                    &e,
                );
                Err(e)
            }
        }
    }

    /// Closes `issue`, first commenting on it when `comment` is not blank
    ///
    /// The comment and the close request are sent concurrently. A failed
    /// comment is reported but does not stop the close. Once GitHub confirms
    /// the closure the issue is dropped from the loaded issues and the
    /// selection is cleared.
    pub async fn close_issue(&self, issue: &Issue, comment: &str) -> Result<(), IssueError> {
        let (repository, generation) = self.require_selection()?;
        let number = issue.number;
        let gateway = &self.shared.gateway;

        tracing::info!("Closing issue #{} in {}", number, repository.full_name());
        let post_comment = async {
            if comment.trim().is_empty() {
                return None;
            }
            Some(gateway.add_comment(&repository, number, comment).await)
        };
        let close = gateway.set_issue_state(&repository, number, IssueState::Closed);
        let (commented, closed) = tokio::join!(post_comment, close);

        if let Some(Err(e)) = &commented {
            self.report_failure(&format!("Failed to comment on issue #{}", number), e);
        }

        let closed = match closed {
            Ok(closed) => closed,
            Err(e) => {
                self.report_failure(&format!("Failed to close issue #{}", number), &e);
                return Err(e);
            }
        };

        if closed.state != IssueState::Closed {
            tracing::warn!(
                "Issue #{} is still {} after the close request",
                number,
                closed.state
            );
            self.upsert_issue(&repository, generation, closed).await;
            return Ok(());
        }

        {
            let mut inner = self.lock();
            if inner.generation != generation {
                tracing::debug!("Issue #{} closed after the selection changed", number);
                return Ok(());
            }
            inner.all_issues.retain(|existing| existing.number != number);
            inner.selected_issue = None;
            inner.issue_markdown.clear();
        }
        self.emit(&[
            StateEvent::IssuesChanged,
            StateEvent::SelectedIssueChanged,
            StateEvent::IssueMarkdownChanged,
        ]);
        Ok(())
    }

    /// Posts a comment on `issue`
    ///
    /// If `issue` is the selected issue the comment is appended to the
    /// rendered markdown.
    pub async fn add_comment(&self, issue: &Issue, text: &str) -> Result<Comment, IssueError> {
        if text.trim().is_empty() {
            return Err(IssueError::InvalidLocalState(
                "Comment text is empty".to_string(),
            ));
        }
        let (repository, generation) = self.require_selection()?;

        let comment = match self
            .shared
            .gateway
            .add_comment(&repository, issue.number, text)
            .await
        {
            Ok(comment) => comment,
            Err(e) => {
                self.report_failure(
                    &format!("Failed to comment on issue #{}", issue.number),
                    &e,
                );
                return Err(e);
            }
        };

        let appended = {
            let mut inner = self.lock();
            let selected = inner.generation == generation
                && inner
                    .selected_issue
                    .as_ref()
                    .is_some_and(|selected| selected.number == issue.number);
            if selected {
                append_comment_markdown(&mut inner.issue_markdown, &comment);
            }
            selected
        };
        if appended {
            self.emit(&[StateEvent::IssueMarkdownChanged]);
        }
        Ok(comment)
    }

    /// Selects an issue and renders its markdown
    ///
    /// The markdown is first set to the issue body, then rebuilt with the
    /// comments once they arrive, provided the issue is still selected.
    /// Selecting `None` clears the markdown.
    pub async fn select_issue(&self, issue: Option<Arc<Issue>>) -> Result<(), IssueError> {
        let (repository, generation) = {
            let mut inner = self.lock();
            inner.issue_markdown = issue
                .as_ref()
                .map(|issue| issue.body.clone())
                .unwrap_or_default();
            inner.selected_issue = issue.clone();
            (inner.repository.clone(), inner.generation)
        };
        self.emit(&[
            StateEvent::SelectedIssueChanged,
            StateEvent::IssueMarkdownChanged,
        ]);

        match (issue, repository) {
            (Some(issue), Some(repository)) if issue.comments > 0 => {
                self.load_comments(&repository, generation, &issue).await
            }
            _ => Ok(()),
        }
    }

    /// Users that issues in the selected repository can be assigned to
    pub async fn assignees(&self) -> Result<Vec<User>, IssueError> {
        let (repository, _) = self.require_selection()?;
        self.shared
            .gateway
            .fetch_assignees(&repository)
            .await
            .inspect_err(|e| {
                self.report_failure(
                    &format!("Failed to fetch assignees for {}", repository.full_name()),
                    e,
                )
            })
    }

    /// Puts `issue` first in the loaded issues and selects it
    async fn upsert_issue(
        &self,
        repository: &RepositoryRef,
        generation: u64,
        issue: Issue,
    ) -> Arc<Issue> {
        let issue = Arc::new(issue);
        let applied = {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.all_issues.retain(|existing| existing.number != issue.number);
                inner.all_issues.insert(0, Arc::clone(&issue));
                inner.selected_issue = Some(Arc::clone(&issue));
                inner.issue_markdown = issue.body.clone();
                true
            } else {
                false
            }
        };

        if !applied {
            tracing::debug!(
                "Not storing issue #{}: {} is no longer selected",
                issue.number,
                repository.full_name()
            );
            return issue;
        }

        self.emit(&[
            StateEvent::IssuesChanged,
            StateEvent::SelectedIssueChanged,
            StateEvent::IssueMarkdownChanged,
        ]);
        if issue.comments > 0 {
            // Already reported
            let _ = self.load_comments(repository, generation, &issue).await;
        }
        issue
    }

    async fn load_comments(
        &self,
        repository: &RepositoryRef,
        generation: u64,
        issue: &Arc<Issue>,
    ) -> Result<(), IssueError> {
        let comments = match self
            .shared
            .gateway
            .fetch_comments(repository, issue.number)
            .await
        {
            Ok(comments) => comments,
            Err(e) => {
                self.report_failure(
                    &format!("Failed to fetch comments for issue #{}", issue.number),
                    &e,
                );
                return Err(e);
            }
        };

        let rendered = {
            let mut inner = self.lock();
            let still_selected = inner.generation == generation
                && inner
                    .selected_issue
                    .as_ref()
                    .is_some_and(|selected| Arc::ptr_eq(selected, issue));
            if still_selected {
                inner.issue_markdown = render_issue_markdown(issue, &comments);
            }
            still_selected
        };
        if rendered {
            self.emit(&[StateEvent::IssueMarkdownChanged]);
        }
        Ok(())
    }
}
