//! File-backed session storage.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use turbo_client::{CredentialStore, Credentials, MemoryCredentialStore};

/// On-disk session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
}

impl SessionFile {
    /// Read a session file. A missing file is not an error.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;
        let file = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", path.display()))?;
        Ok(Some(file))
    }
}

/// [`CredentialStore`] that mirrors every write to a JSON file, so sessions
/// renewed by the pipeline survive the process.
pub struct FileCredentialStore {
    path: PathBuf,
    inner: MemoryCredentialStore,
}

impl FileCredentialStore {
    /// Open the store, loading the session saved at `path` if there is one.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = match SessionFile::read(&path)? {
            Some(file) => MemoryCredentialStore::with_credentials(file.credentials),
            None => MemoryCredentialStore::new(),
        };
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking `std::fs` I/O on the calling task, inside the refresh lock
    /// when called from the pipeline. `CredentialStore` is synchronous.
    fn persist(&self, credentials: Option<&Credentials>) -> Result<()> {
        match credentials {
            Some(credentials) => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create directory: {}", parent.display())
                    })?;
                }
                let file = SessionFile {
                    credentials: credentials.clone(),
                    saved_at: Utc::now(),
                };
                std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)
                    .with_context(|| format!("Failed to write session file: {}", self.path.display()))
            }
            None if self.path.exists() => std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file: {}", self.path.display())),
            None => Ok(()),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn credentials(&self) -> Option<Credentials> {
        self.inner.credentials()
    }

    fn set_credentials(&self, credentials: Credentials) {
        // The in-memory session stays authoritative even if the write fails.
        if let Err(e) = self.persist(Some(&credentials)) {
            warn!(path = %self.path.display(), error = %format!("{:#}", e), "failed to save session");
        } else {
            debug!(path = %self.path.display(), "session saved");
        }
        self.inner.set_credentials(credentials);
    }

    fn clear_credentials(&self) -> bool {
        if let Err(e) = self.persist(None) {
            warn!(path = %self.path.display(), error = %format!("{:#}", e), "failed to remove session file");
        }
        self.inner.clear_credentials()
    }
}
