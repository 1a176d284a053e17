//! gitissues: browse and manage GitHub issues from the terminal
//!
//! This library keeps the issues, labels and milestones of a selected GitHub
//! repository in memory and filters them locally:
//! - Filter issues by label, milestone, assignee/reporter and free text
//! - Create, edit, comment on and close issues
//! - Discover the repositories of the logged-in user and their organizations
//! - Pick the repository matching a local git working copy
//!
//! ## Authentication
//!
//! GitHub access uses a personal access token or a login/password pair. The
//! `gitissues` binary reads the token from `--github-token` or the
//! `GITISSUES_GITHUB_TOKEN` environment variable. Only `gitissues login`
//! persists the token in the settings file; other commands use it for the
//! current run.
//!
//! ```bash
//! export GITISSUES_GITHUB_TOKEN=your_github_token
//! gitissues issues --repo octocat/Hello-World --label bug
//! ```
//!
//! See [`issues`] for the library API.

pub mod issues;
