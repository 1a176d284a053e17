//! Credential and selection persistence
//!
//! Stores the login credentials (or access token) and the id of the last
//! selected repository between sessions.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::error::IssueError;
use super::models::{Credentials, RepositoryId};

/// Key-value persistence for credentials and the selected repository
///
/// Reads never fail: an unreadable store reads as empty. Writes report
/// failures as [`IssueError::Storage`].
pub trait CredentialStore: Send + Sync {
    fn credentials(&self) -> Option<Credentials>;

    fn save_credentials(&self, credentials: &Credentials) -> Result<(), IssueError>;

    fn clear_credentials(&self) -> Result<(), IssueError>;

    /// Id of the last selected repository, `None` if cleared
    fn selected_repository_id(&self) -> Option<RepositoryId>;

    fn set_selected_repository_id(&self, id: Option<RepositoryId>) -> Result<(), IssueError>;
}

/// On-disk document shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredSettings {
    credentials: Option<Credentials>,
    /// `0` means no selection
    repository: u64,
}

impl StoredSettings {
    fn selected(&self) -> Option<RepositoryId> {
        (self.repository != 0).then_some(RepositoryId(self.repository))
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}

/// JSON file backed store
///
/// Secrets are stored as plain JSON. On unix the file is created with
/// `0600` permissions and every write replaces it atomically.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at `<config_dir>/gitissues/settings.json`
    pub fn with_default_path() -> Result<Self, IssueError> {
        let dir = dirs::config_dir().ok_or_else(|| {
            IssueError::Configuration("Unable to determine the user config directory".to_string())
        })?;
        Ok(Self::new(dir.join("gitissues").join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoredSettings {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoredSettings::default(),
            Err(e) => {
                tracing::error!("Failed to read settings {}: {}", self.path.display(), e);
                return StoredSettings::default();
            }
        };

        serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::error!("Failed to parse settings {}: {}", self.path.display(), e);
            StoredSettings::default()
        })
    }

    fn write(&self, settings: &StoredSettings) -> Result<(), IssueError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                IssueError::Storage(format!(
                    "Failed to create settings directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let text = serde_json::to_string_pretty(settings)
            .map_err(|e| IssueError::Storage(format!("Failed to serialize settings: {}", e)))?;

        let storage_error = |e: std::io::Error| {
            IssueError::Storage(format!(
                "Failed to write settings {}: {}",
                self.path.display(),
                e
            ))
        };

        // Written next to the target and renamed over it, readable by the owner only
        let dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(storage_error)?;
        restrict_permissions(file.as_file()).map_err(storage_error)?;
        file.write_all(text.as_bytes()).map_err(storage_error)?;
        file.as_file().sync_all().map_err(storage_error)?;
        file.persist(&self.path).map_err(|e| storage_error(e.error))?;
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut StoredSettings)) -> Result<(), IssueError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut settings = self.read();
        change(&mut settings);
        self.write(&settings)
    }
}

impl CredentialStore for FileCredentialStore {
    fn credentials(&self) -> Option<Credentials> {
        self.read().credentials
    }

    fn save_credentials(&self, credentials: &Credentials) -> Result<(), IssueError> {
        self.update(|settings| settings.credentials = Some(credentials.clone()))
    }

    fn clear_credentials(&self) -> Result<(), IssueError> {
        self.update(|settings| settings.credentials = None)
    }

    fn selected_repository_id(&self) -> Option<RepositoryId> {
        self.read().selected()
    }

    fn set_selected_repository_id(&self, id: Option<RepositoryId>) -> Result<(), IssueError> {
        self.update(|settings| settings.repository = id.map(|id| id.0).unwrap_or(0))
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    settings: Mutex<StoredSettings>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut StoredSettings) -> R) -> R {
        let mut settings = self
            .settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut settings)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credentials(&self) -> Option<Credentials> {
        self.with(|settings| settings.credentials.clone())
    }

    fn save_credentials(&self, credentials: &Credentials) -> Result<(), IssueError> {
        self.with(|settings| settings.credentials = Some(credentials.clone()));
        Ok(())
    }

    fn clear_credentials(&self) -> Result<(), IssueError> {
        self.with(|settings| settings.credentials = None);
        Ok(())
    }

    fn selected_repository_id(&self) -> Option<RepositoryId> {
        self.with(|settings| settings.selected())
    }

    fn set_selected_repository_id(&self, id: Option<RepositoryId>) -> Result<(), IssueError> {
        self.with(|settings| settings.repository = id.map(|id| id.0).unwrap_or(0));
        Ok(())
    }
}
