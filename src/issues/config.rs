//! Runtime configuration
//!
//! Configuration is always passed explicitly: the aggregate receives an
//! [`OptionsProvider`] and the binary builds an [`AppConfig`] from command line
//! arguments, the environment and the options file.
//!
//! ## Authentication
//!
//! The GitHub token is resolved in this order:
//!
//! 1. `--github-token` on the command line
//! 2. The `GITISSUES_GITHUB_TOKEN` environment variable
//! 3. Credentials saved by a previous `login`
//!
//! ```bash
//! export GITISSUES_GITHUB_TOKEN=your_github_token
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::IssueError;

/// Environment variable holding a GitHub access token
pub const GITHUB_TOKEN_ENV: &str = "GITISSUES_GITHUB_TOKEN";

/// Default GitHub REST API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// User preferences read by the issue state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Hide repositories that have no open issues from the repository list
    pub hide_repositories_with_no_issues: bool,

    /// Do not select a repository automatically from the working directory
    pub disable_auto_select_repository: bool,
}

impl Options {
    /// Default location of the options file (`<config_dir>/gitissues/options.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gitissues").join("options.json"))
    }

    /// Loads options from a JSON file
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// a configuration error.
    pub fn load(path: &Path) -> Result<Self, IssueError> {
        if !path.exists() {
            tracing::debug!("No options file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            IssueError::Configuration(format!(
                "Failed to read options file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&text).map_err(|e| {
            IssueError::Configuration(format!(
                "Failed to parse options file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// Supplies a snapshot of the current user preferences
pub trait OptionsProvider: Send + Sync {
    fn options(&self) -> Options;
}

/// Fixed options
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticOptions(pub Options);

impl OptionsProvider for StaticOptions {
    fn options(&self) -> Options {
        self.0
    }
}

/// Everything the binary needs to wire up a session
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Access token from the command line or environment
    pub github_token: Option<String>,

    /// Base URI of the GitHub REST API
    pub api_url: String,

    /// Settings/credentials file; `None` uses the platform default
    pub settings_path: Option<PathBuf>,

    /// User preferences
    pub options: Options,
}

impl AppConfig {
    /// Resolves the configuration
    ///
    /// `cli_token` takes precedence over the `GITISSUES_GITHUB_TOKEN`
    /// environment variable. Blank tokens are ignored.
    pub fn resolve(
        cli_token: Option<String>,
        api_url: Option<String>,
        settings_path: Option<PathBuf>,
        options: Options,
    ) -> Self {
        let github_token = cli_token
            .or_else(|| std::env::var(GITHUB_TOKEN_ENV).ok())
            .filter(|token| !token.trim().is_empty());

        Self {
            github_token,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            settings_path,
            options,
        }
    }
}
