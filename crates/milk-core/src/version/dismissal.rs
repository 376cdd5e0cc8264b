//! Persisted dismissal of update notices

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The user dismissed the notice for `version` until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DismissalRecord {
    pub version: String,
    pub dismissed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DismissalRecord {
    pub fn new(version: impl Into<String>, cooldown_hours: i64, now: DateTime<Utc>) -> Self {
        Self {
            version: version.into().trim().to_string(),
            dismissed_at: now,
            expires_at: now + Duration::hours(cooldown_hours.max(0)),
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Client-local storage for the most recent dismissal.
pub trait DismissalStore {
    fn load(&self) -> Result<Option<DismissalRecord>>;
    fn save(&self, record: &DismissalRecord) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// JSON file holding a single [`DismissalRecord`].
#[derive(Debug, Clone)]
pub struct FileDismissalStore {
    path: PathBuf,
}

impl FileDismissalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DismissalStore for FileDismissalStore {
    fn load(&self) -> Result<Option<DismissalRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(error) => {
                tracing::warn!(
                    "Ignoring unreadable dismissal record at {}: {}",
                    self.path.display(),
                    error
                );
                Ok(None)
            }
        }
    }

    fn save(&self, record: &DismissalRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryDismissalStore {
    record: Mutex<Option<DismissalRecord>>,
}

impl MemoryDismissalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DismissalStore for MemoryDismissalStore {
    fn load(&self) -> Result<Option<DismissalRecord>> {
        self.record
            .lock()
            .map(|record| record.clone())
            .map_err(|_| Error::Storage("dismissal store lock poisoned".to_string()))
    }

    fn save(&self, record: &DismissalRecord) -> Result<()> {
        let mut guard = self
            .record
            .lock()
            .map_err(|_| Error::Storage("dismissal store lock poisoned".to_string()))?;
        *guard = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .record
            .lock()
            .map_err(|_| Error::Storage("dismissal store lock poisoned".to_string()))?;
        *guard = None;
        Ok(())
    }
}
