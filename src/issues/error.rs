//! Error taxonomy for the issue core
//!
//! All gateway failures are converted into [`IssueError`] at the boundary, so
//! callers only ever deal with these kinds.

use strum::{AsRefStr, Display};
use thiserror::Error;

/// Coarse classification of an [`IssueError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum ErrorKind {
    AuthenticationFailure,
    NetworkFailure,
    RemoteRejection,
    InvalidLocalState,
    Configuration,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueError {
    /// Login or token rejected by GitHub
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Connectivity, timeout or malformed response
    #[error("Network error: {0}")]
    Network(String),

    /// Well-formed error response from the GitHub API
    #[error("GitHub API error {status}: {message}")]
    RemoteRejection { status: u16, message: String },

    /// Operation not possible in the current state (e.g. no repository selected)
    #[error("Invalid state: {0}")]
    InvalidLocalState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Settings or credential persistence failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl IssueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IssueError::Authentication(_) => ErrorKind::AuthenticationFailure,
            IssueError::Network(_) => ErrorKind::NetworkFailure,
            IssueError::RemoteRejection { .. } => ErrorKind::RemoteRejection,
            IssueError::InvalidLocalState(_) => ErrorKind::InvalidLocalState,
            IssueError::Configuration(_) => ErrorKind::Configuration,
            IssueError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Shorthand for the "no repository selected" guard
    pub fn no_repository() -> Self {
        IssueError::InvalidLocalState("No repository selected".to_string())
    }
}

impl From<octocrab::Error> for IssueError {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                if status == 401 {
                    IssueError::Authentication(source.message.clone())
                } else {
                    IssueError::RemoteRejection {
                        status,
                        message: source.message.clone(),
                    }
                }
            }
            _ => IssueError::Network(err.to_string()),
        }
    }
}
