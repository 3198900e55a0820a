//! Persistent storage for sessions
//!
//! Uses JSON file storage in ~/.config/mixlink/sessions.json

use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration directory not found")]
    NoConfigDir,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// On-disk layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredData {
    /// Sessions ordered by creation time
    sessions: Vec<Session>,
}

/// Borrowed form of [`StoredData`] so saves don't clone every session
#[derive(Serialize)]
struct StoredDataRef<'a> {
    sessions: &'a [Session],
}

/// The session file on disk
///
/// Writes replace the whole file through a temporary sibling and a rename,
/// so a reader never sees a half-written file. Callers serialize writes.
#[derive(Debug)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Open the session file at the default location
    pub fn new() -> StorageResult<Self> {
        Self::with_path(Self::default_path()?)
    }

    /// Open the session file at a specific path
    pub fn with_path(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Get the default storage path (~/.config/mixlink/sessions.json)
    pub fn default_path() -> StorageResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(config_dir.join("mixlink").join("sessions.json"))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all stored sessions
    ///
    /// A missing, unreadable or corrupt file is treated as empty.
    pub async fn load(&self) -> Vec<Session> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No existing session storage, starting empty");
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to read session storage, starting empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<StoredData>(&contents) {
            Ok(data) => {
                info!(
                    "Loaded {} session(s) from {:?}",
                    data.sessions.len(),
                    self.path
                );
                data.sessions
            }
            Err(e) => {
                warn!("Failed to parse session storage, starting empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Replace the file contents with `sessions`
    pub async fn write(&self, sessions: &[Session]) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(&StoredDataRef { sessions })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Saved {} session(s) to {:?}", sessions.len(), self.path);
        Ok(())
    }
}
