//! Git working copy discovery
//!
//! Used to pick the GitHub repository matching the code the user is working
//! on. The enclosing repository is discovered with gix, and the owner and
//! repository name are extracted from its `origin` remote URL.

use std::path::Path;

/// Owner and repository name parsed from a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubRemote {
    pub owner: String,
    pub name: String,
}

/// Fetch URL of the `origin` remote of the working copy containing `path`
///
/// `path` may be a file or a directory anywhere inside the working copy,
/// including linked worktrees and submodules. URL rewrites from the git
/// configuration (`insteadOf`) are applied.
pub fn origin_remote(path: &Path) -> Option<String> {
    let start = if path.is_file() { path.parent()? } else { path };

    let repo = match gix::discover(start) {
        Ok(repo) => repo,
        Err(e) => {
            tracing::debug!("No git repository at {}: {}", start.display(), e);
            return None;
        }
    };

    let remote = match repo.find_remote("origin") {
        Ok(remote) => remote,
        Err(e) => {
            tracing::debug!("Repository at {} has no origin remote: {}", start.display(), e);
            return None;
        }
    };

    remote
        .url(gix::remote::Direction::Fetch)
        .map(|url| url.to_bstring().to_string())
}

/// Parses GitHub remote URLs
///
/// Supported forms:
/// - `https://github.com/owner/name` (optionally with `.git` and/or a trailing slash)
/// - `git@github.com:owner/name.git`
/// - `ssh://git@github.com/owner/name.git`
/// - `github:owner/name`
pub fn parse_github_remote(url: &str) -> Option<GithubRemote> {
    let url = url.trim();
    let owner_name = if let Some(rest) = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
    {
        rest
    } else if let Some(rest) = url.strip_prefix("git@github.com:") {
        rest
    } else if let Some(rest) = url.strip_prefix("github:") {
        rest.trim_start_matches('/')
    } else {
        return None;
    };

    let owner_name = owner_name.trim_end_matches('/').trim_end_matches(".git");
    let (owner, name) = owner_name.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }

    Some(GithubRemote {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

/// Finds the GitHub remote for the working copy containing `path`
pub fn github_remote_for_path(path: &Path) -> Option<GithubRemote> {
    let url = origin_remote(path)?;
    let remote = parse_github_remote(&url);
    if remote.is_none() {
        tracing::debug!("Origin remote {} is not a GitHub repository", url);
    }
    remote
}
