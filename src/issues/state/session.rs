//! Login, logout and repository discovery

use std::path::Path;

use tokio::task::JoinHandle;

use super::{IssueRepositoryState, StateEvent};
use crate::issues::error::{ErrorKind, IssueError};
use crate::issues::filter::filter_repositories;
use crate::issues::local_repository::github_remote_for_path;
use crate::issues::models::{Credentials, User};

/// How [`IssueRepositoryState::login_with`] treats the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginOptions {
    /// Save the credentials once GitHub accepts them
    pub persist_credentials: bool,

    /// Select the persisted (or first) repository once the repositories are
    /// loaded. When false nothing is selected and no issues are fetched.
    pub restore_selection: bool,
}

impl LoginOptions {
    /// Authenticate for this session only and leave the selection to the caller
    pub fn session_only() -> Self {
        Self {
            persist_credentials: false,
            restore_selection: false,
        }
    }
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            persist_credentials: true,
            restore_selection: true,
        }
    }
}

impl IssueRepositoryState {
    /// Logs in, persists the credentials and restores the repository selection
    ///
    /// Same as [`login_with`](Self::login_with) with the default options.
    pub async fn login(&self, credentials: Credentials) -> Result<User, IssueError> {
        self.login_with(credentials, LoginOptions::default()).await
    }

    /// Logs in and loads the user's repositories
    ///
    /// If GitHub rejects the credentials the session is ended before the
    /// error is returned; persisted credentials are only cleared when
    /// `options.persist_credentials` is set. Failing to load repositories
    /// after a successful login is reported but does not fail the login.
    pub async fn login_with(
        &self,
        credentials: Credentials,
        options: LoginOptions,
    ) -> Result<User, IssueError> {
        if credentials.has_token() {
            tracing::info!("Logging in with an access token");
        } else {
            tracing::info!("Logging in as {}", credentials.login);
        }

        let user = match self.shared.gateway.authenticate(&credentials).await {
            Ok(user) => user,
            Err(e) => {
                self.report_failure("Failed to log in to GitHub", &e);
                if e.kind() == ErrorKind::AuthenticationFailure {
                    self.end_session(options.persist_credentials);
                }
                return Err(e);
            }
        };

        if options.persist_credentials {
            if let Err(e) = self.shared.store.save_credentials(&credentials) {
                self.report_failure("Failed to save credentials", &e);
            }
        }

        {
            let mut inner = self.lock();
            inner.user = Some(user.clone());
            inner.logged_in = true;
        }
        tracing::info!("Logged in as {}", user.login);
        self.emit(&[
            StateEvent::LoggedInChanged,
            StateEvent::UserChanged,
            StateEvent::IssuesChanged,
        ]);

        if let Err(e) = self.fetch_repository_list(options.restore_selection).await {
            if e.kind() == ErrorKind::AuthenticationFailure {
                self.end_session(options.persist_credentials);
                return Err(e);
            }
        }
        Ok(user)
    }

    /// Logs in with the stored credentials, if there are any
    pub async fn login_from_store(&self) -> Result<Option<User>, IssueError> {
        self.login_from_store_with(LoginOptions::default()).await
    }

    /// Like [`login_from_store`](Self::login_from_store) with explicit options
    ///
    /// The credentials already come from the store, so
    /// `persist_credentials` only decides whether a rejected login clears them.
    pub async fn login_from_store_with(
        &self,
        options: LoginOptions,
    ) -> Result<Option<User>, IssueError> {
        match self.shared.store.credentials() {
            Some(credentials) if credentials.has_token() || !credentials.login.is_empty() => {
                let options = LoginOptions {
                    persist_credentials: false,
                    ..options
                };
                let result = self.login_with(credentials, options).await;
                if let Err(e) = &result {
                    if e.kind() == ErrorKind::AuthenticationFailure {
                        self.clear_stored_credentials();
                    }
                }
                result.map(Some)
            }
            _ => {
                tracing::debug!("No stored credentials");
                Ok(None)
            }
        }
    }

    /// Forgets the credentials and everything loaded with them
    ///
    /// The persisted repository selection is kept so the next login can
    /// restore it.
    pub fn logout(&self) {
        tracing::info!("Logging out");
        self.end_session(true);
    }

    fn clear_stored_credentials(&self) {
        if let Err(e) = self.shared.store.clear_credentials() {
            self.report_failure("Failed to clear credentials", &e);
        }
    }

    /// Drops the session state, and the stored credentials if `forget` is set
    fn end_session(&self, forget: bool) {
        self.shared.gateway.sign_out();
        if forget {
            self.clear_stored_credentials();
        }

        {
            let mut inner = self.lock();
            inner.user = None;
            inner.logged_in = false;
            inner.repositories.clear();
            inner.repository = None;
            inner.generation += 1;
            inner.clear_repository_data();
        }
        self.emit(&[
            StateEvent::LoggedInChanged,
            StateEvent::UserChanged,
            StateEvent::RepositoriesChanged,
            StateEvent::RepositoryChanged,
            StateEvent::LabelsChanged,
            StateEvent::MilestonesChanged,
            StateEvent::FilterChanged,
            StateEvent::SelectedIssueChanged,
            StateEvent::IssueMarkdownChanged,
            StateEvent::IssuesChanged,
        ]);
    }

    /// Loads the repositories of the user and their organizations
    ///
    /// Afterwards the persisted selection is restored if it is still
    /// available, otherwise the first repository is selected. Returns once
    /// the selected repository's labels, milestones and issues have landed.
    pub async fn load_repositories(&self) -> Result<(), IssueError> {
        self.fetch_repository_list(true).await
    }

    async fn fetch_repository_list(&self, restore_selection: bool) -> Result<(), IssueError> {
        let repositories = match self.shared.gateway.fetch_repositories().await {
            Ok(repositories) => repositories,
            Err(e) => {
                self.report_failure("Failed to load repositories", &e);
                return Err(e);
            }
        };

        let options = self.shared.options.options();
        let count = {
            let mut inner = self.lock();
            inner.repositories.clear();
            for repository in filter_repositories(repositories, &options) {
                inner.repositories.insert(repository);
            }
            inner.repositories.iter().count()
        };
        tracing::info!("Loaded {} repositories", count);
        self.emit(&[StateEvent::RepositoriesChanged]);

        if restore_selection {
            if let Some(handle) = self.restore_repository() {
                if let Err(e) = handle.await {
                    tracing::error!("Repository refresh task failed: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Selects the persisted repository if it is loaded, otherwise the first one
    ///
    /// Returns the refresh handle as [`set_repository`](Self::set_repository) does.
    pub fn restore_repository(&self) -> Option<JoinHandle<()>> {
        let stored = self.shared.store.selected_repository_id();
        let selection = {
            let inner = self.lock();
            stored
                .and_then(|id| inner.repositories.get(id))
                .or_else(|| inner.repositories.first())
                .cloned()
        };
        self.set_repository(selection)
    }

    /// Selects the loaded repository matching the git working copy at `path`
    ///
    /// Returns `Ok(None)` without changing the selection when auto-selection
    /// is disabled, `path` is not inside a GitHub working copy, or the
    /// matching repository is already selected. A GitHub working copy whose
    /// repository is not among the loaded ones is an
    /// [`IssueError::InvalidLocalState`].
    pub fn select_repository_for_path(
        &self,
        path: &Path,
    ) -> Result<Option<JoinHandle<()>>, IssueError> {
        if self.shared.options.options().disable_auto_select_repository {
            tracing::debug!("Repository auto-selection is disabled");
            return Ok(None);
        }

        let Some(remote) = github_remote_for_path(path) else {
            return Ok(None);
        };
        let repository = self
            .lock()
            .repositories
            .find(&remote.owner, &remote.name)
            .cloned();
        match repository {
            Some(repository) => Ok(self.set_repository(Some(repository))),
            None => Err(IssueError::InvalidLocalState(format!(
                "The working copy belongs to {}/{}, which is not among the loaded repositories",
                remote.owner, remote.name
            ))),
        }
    }
}
