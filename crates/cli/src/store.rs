//! Persistence of the session tracker between invocations.
//!
//! The tracker is written as JSON after every command, so a job started
//! with `generate --detach` can be checked, downloaded or reset later.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pokegen_session::JobTracker;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON file holding one [`JobTracker`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted tracker, or a fresh one when no file exists.
    pub async fn load(&self) -> Result<JobTracker, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(JobTracker::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the tracker, replacing any previous state.
    ///
    /// Writes to a sibling temp file first so a crash never leaves a
    /// half-written session behind.
    pub async fn save(&self, tracker: &JobTracker) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(tracker).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        tracing::debug!(path = %self.path.display(), status = %tracker.status(), "Session saved");
        Ok(())
    }
}
