use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{self, EnvFilter};

use gitissues::issues::{
    AppConfig, CredentialStore, Credentials, FileCredentialStore, Issue, IssueRepositoryState,
    LabelFilter, LoginOptions, MilestoneFilter, NewIssue, OctocrabGateway, Options,
    RemoteGitHubGateway, RepositoryRef, StaticOptions, UserFilterKind,
};

#[derive(Parser)]
#[command(author, version = "0.1.0", about = "gitissues CLI for browsing and managing GitHub issues", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// GitHub API token for authentication (overrides GITISSUES_GITHUB_TOKEN environment variable)
    #[arg(short = 't', long, global = true)]
    github_token: Option<String>,

    /// Base URL of the GitHub REST API
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Settings file holding the stored credentials and the last selected repository
    #[arg(long = "settings", global = true)]
    settings_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with the access token and remember it
    Login,
    /// Forget the stored credentials
    Logout,
    /// List the repositories of the user and their organizations
    Repos {
        /// Hide repositories without open issues
        #[arg(long)]
        hide_empty: bool,
    },
    /// List the labels of a repository
    Labels {
        #[arg(short, long = "repo", help = REPOSITORY_HELP)]
        repository: Option<String>,
    },
    /// List the open milestones of a repository
    Milestones {
        #[arg(short, long = "repo", help = REPOSITORY_HELP)]
        repository: Option<String>,
    },
    /// List open issues of a repository
    Issues {
        #[arg(short, long = "repo", help = REPOSITORY_HELP)]
        repository: Option<String>,

        /// Only issues with this label
        #[arg(short, long)]
        label: Option<String>,

        /// 'all', 'none' (issues without a milestone) or a milestone number
        #[arg(short, long, value_parser = parse_milestone_filter)]
        milestone: Option<MilestoneFilter>,

        /// Case-insensitive text to look for in titles and bodies
        #[arg(short, long)]
        search: Option<String>,

        /// Restrict to issues related to the logged-in user
        #[arg(short, long, value_enum, default_value = "all")]
        user: UserFilterArg,
    },
    /// Create an issue
    Create {
        #[arg(short, long = "repo", help = REPOSITORY_HELP)]
        repository: Option<String>,

        #[arg(long)]
        title: String,

        #[arg(long)]
        body: Option<String>,

        /// Label to attach (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,
    },
    /// Comment on an open issue
    Comment {
        #[arg(short, long = "repo", help = REPOSITORY_HELP)]
        repository: Option<String>,

        number: u64,

        text: String,
    },
    /// Close an open issue
    Close {
        #[arg(short, long = "repo", help = REPOSITORY_HELP)]
        repository: Option<String>,

        number: u64,

        /// Comment to post while closing
        #[arg(short, long)]
        comment: Option<String>,
    },
}

const REPOSITORY_HELP: &str = "Repository as 'owner/name'. Defaults to the repository of the git working copy in the current directory, or the last selected repository";

/// User filter options for issue listing
#[derive(clap::ValueEnum, Clone, Debug)]
enum UserFilterArg {
    All,
    AssignedToMe,
    ReportedByMe,
    Unassigned,
}

impl From<UserFilterArg> for UserFilterKind {
    fn from(value: UserFilterArg) -> Self {
        match value {
            UserFilterArg::All => UserFilterKind::All,
            UserFilterArg::AssignedToMe => UserFilterKind::AssignedToMe,
            UserFilterArg::ReportedByMe => UserFilterKind::ReportedByMe,
            UserFilterArg::Unassigned => UserFilterKind::Unassigned,
        }
    }
}

fn parse_milestone_filter(value: &str) -> Result<MilestoneFilter, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "all" => Ok(MilestoneFilter::All),
        "none" => Ok(MilestoneFilter::None),
        number => number
            .parse::<u64>()
            .map(MilestoneFilter::Specific)
            .map_err(|_| format!("expected 'all', 'none' or a milestone number, got '{}'", value)),
    }
}

/// Logs in with the configured token, falling back to the stored credentials
///
/// Nothing is persisted and no repository is selected yet.
async fn ensure_logged_in(state: &IssueRepositoryState, config: &AppConfig) -> Result<()> {
    let options = LoginOptions::session_only();
    let user = match &config.github_token {
        Some(token) => {
            state
                .login_with(Credentials::token(token.clone()), options)
                .await?
        }
        None => match state.login_from_store_with(options).await? {
            Some(user) => user,
            None => anyhow::bail!(
                "Not logged in: pass --github-token, set GITISSUES_GITHUB_TOKEN or run `gitissues login`"
            ),
        },
    };
    tracing::debug!("Authenticated as {}", user.login);
    Ok(())
}

/// Selects the repository named on the command line, the one matching the
/// current directory, or the last selected one, in that order
async fn select_repository(
    state: &IssueRepositoryState,
    gateway: &OctocrabGateway,
    repository: Option<String>,
) -> Result<RepositoryRef> {
    let handle = match repository {
        Some(full_name) => {
            let Some((owner, name)) = full_name
                .split_once('/')
                .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            else {
                anyhow::bail!("Repository must be given as owner/name, got '{}'", full_name);
            };
            let known = state
                .repositories()
                .into_iter()
                .find(|repository| repository.matches(owner, name));
            let repository = match known {
                Some(repository) => repository,
                None => gateway.fetch_repository(owner, name).await?,
            };
            state.set_repository(Some(repository))
        }
        None => {
            let current_dir = std::env::current_dir()?;
            match state.select_repository_for_path(&current_dir)? {
                Some(handle) => Some(handle),
                None if state.repository().is_some() => None,
                None => state.restore_repository(),
            }
        }
    };

    if let Some(handle) = handle {
        handle.await?;
    }
    state
        .repository()
        .ok_or_else(|| anyhow::anyhow!("No repository selected: pass --repo owner/name"))
}

fn find_issue(state: &IssueRepositoryState, number: u64) -> Result<Arc<Issue>> {
    state
        .all_issues()
        .into_iter()
        .find(|issue| issue.number == number)
        .ok_or_else(|| anyhow::anyhow!("Open issue #{} not found", number))
}

fn print_issue(issue: &Issue) {
    let labels: Vec<&str> = issue.labels.iter().map(|label| label.name.as_str()).collect();
    println!("#{:<6} {}", issue.number, issue.title);
    println!(
        "        by {} on {}{}",
        issue.reporter.login,
        issue.created_at.format("%Y-%m-%d"),
        issue
            .assignee
            .as_ref()
            .map(|assignee| format!(", assigned to {}", assignee.login))
            .unwrap_or_default()
    );
    if !labels.is_empty() {
        println!("        labels: {}", labels.join(", "));
    }
    if let Some(milestone) = &issue.milestone {
        println!("        milestone: {}", milestone.title);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr) // Use stderr for logging
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let mut options = match Options::default_path() {
        Some(path) => Options::load(&path)?,
        None => Options::default(),
    };
    if let Commands::Repos { hide_empty: true } = cli.command {
        options.hide_repositories_with_no_issues = true;
    }

    let config = AppConfig::resolve(cli.github_token, cli.api_url, cli.settings_path, options);
    let store = Arc::new(match &config.settings_path {
        Some(path) => FileCredentialStore::new(path.clone()),
        None => FileCredentialStore::with_default_path()?,
    });
    tracing::info!("Using settings file: {}", store.path().display());

    let gateway = Arc::new(OctocrabGateway::new(config.api_url.clone())?);
    let state = IssueRepositoryState::builder()
        .gateway(gateway.clone())
        .store(store.clone())
        .options(Arc::new(StaticOptions(config.options)))
        .build()?;

    match cli.command {
        Commands::Login => {
            let Some(token) = config.github_token.clone() else {
                anyhow::bail!("No token given: pass --github-token or set GITISSUES_GITHUB_TOKEN");
            };
            let options = LoginOptions {
                persist_credentials: true,
                restore_selection: false,
            };
            let user = state.login_with(Credentials::token(token), options).await?;
            println!(
                "Logged in as {} ({} repositories)",
                user.login,
                state.repositories().len()
            );
            Ok(())
        }
        Commands::Logout => {
            state.logout();
            println!("Logged out");
            Ok(())
        }
        Commands::Repos { .. } => {
            ensure_logged_in(&state, &config).await?;
            let selected = store.selected_repository_id();
            for repository in state.repositories() {
                let marker = if selected == Some(repository.id) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:<50} {:>5} open issues{}",
                    marker,
                    repository.full_name(),
                    repository.open_issues_count,
                    if repository.private { " (private)" } else { "" }
                );
            }
            Ok(())
        }
        Commands::Labels { repository } => {
            ensure_logged_in(&state, &config).await?;
            select_repository(&state, &gateway, repository).await?;
            for label in state.labels() {
                println!("{:<30} #{}", label.name, label.color);
            }
            Ok(())
        }
        Commands::Milestones { repository } => {
            ensure_logged_in(&state, &config).await?;
            select_repository(&state, &gateway, repository).await?;
            for milestone in state.milestones() {
                let due = milestone
                    .due_on
                    .map(|due| format!(" (due {})", due.format("%Y-%m-%d")))
                    .unwrap_or_default();
                println!(
                    "{:<6} {}{} - {} open issues",
                    milestone.number, milestone.title, due, milestone.open_issues
                );
            }
            Ok(())
        }
        Commands::Issues {
            repository,
            label,
            milestone,
            search,
            user,
        } => {
            ensure_logged_in(&state, &config).await?;
            let repository = select_repository(&state, &gateway, repository).await?;

            if let Some(label) = label {
                state.set_label_filter(LabelFilter::Specific(label));
            }
            if let Some(milestone) = milestone {
                state.set_milestone_filter(milestone);
            }
            if let Some(search) = search {
                state.set_search_text(search);
            }
            state.set_user_filter(user.into());

            let issues = state.issues();
            if issues.is_empty() {
                eprintln!("No matching issues in {}.", repository.full_name());
            }
            for issue in issues {
                print_issue(&issue);
            }
            Ok(())
        }
        Commands::Create {
            repository,
            title,
            body,
            labels,
        } => {
            ensure_logged_in(&state, &config).await?;
            let repository = select_repository(&state, &gateway, repository).await?;
            let draft = NewIssue {
                title,
                body: body.unwrap_or_default(),
                labels,
                ..NewIssue::default()
            };
            let issue = state.add_issue(draft).await?;
            println!("Created issue #{} in {}", issue.number, repository.full_name());
            Ok(())
        }
        Commands::Comment {
            repository,
            number,
            text,
        } => {
            ensure_logged_in(&state, &config).await?;
            select_repository(&state, &gateway, repository).await?;
            let issue = find_issue(&state, number)?;
            let comment = state.add_comment(&issue, &text).await?;
            println!("Commented on issue #{} (comment {})", number, comment.id);
            Ok(())
        }
        Commands::Close {
            repository,
            number,
            comment,
        } => {
            ensure_logged_in(&state, &config).await?;
            select_repository(&state, &gateway, repository).await?;
            let issue = find_issue(&state, number)?;
            state
                .close_issue(&issue, comment.as_deref().unwrap_or_default())
                .await?;
            println!("Closed issue #{}", number);
            Ok(())
        }
    }
}
