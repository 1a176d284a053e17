//! GitHub issue browsing for a selected repository
//!
//! This module provides:
//! - The observable issue state ([`IssueRepositoryState`]) with client-side
//!   label, milestone, user and search filtering
//! - Issue creation, editing, closing and comments
//! - Login, logout and repository discovery
//! - Selecting the repository that matches a local git working copy
//!
//! Remote access goes through the [`RemoteGitHubGateway`] trait; the
//! production implementation is [`OctocrabGateway`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use gitissues::issues::{
//!     Credentials, IssueRepositoryState, LabelFilter, MemoryCredentialStore, OctocrabGateway,
//! };
//!
//! # async fn example() -> Result<(), gitissues::issues::IssueError> {
//! let state = IssueRepositoryState::builder()
//!     .gateway(Arc::new(OctocrabGateway::new("https://api.github.com")?))
//!     .store(Arc::new(MemoryCredentialStore::new()))
//!     .build()?;
//!
//! state.login(Credentials::token("your_github_token")).await?;
//! state.set_label_filter(LabelFilter::Specific("bug".to_string()));
//! for issue in state.issues() {
//!     println!("#{} {}", issue.number, issue.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod local_repository;
pub mod models;
pub mod reporter;
mod state;

pub use config::{AppConfig, Options, OptionsProvider, StaticOptions};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ErrorKind, IssueError};
pub use filter::{FilterState, LabelFilter, MilestoneFilter, UserFilterKind};
pub use gateway::{OctocrabGateway, RemoteGitHubGateway};
pub use models::*;
pub use reporter::{ErrorReporter, TracingErrorReporter};
pub use state::{
    IssueRepositoryState, IssueRepositoryStateBuilder, LoginOptions, StateEvent,
    render_issue_markdown,
};
