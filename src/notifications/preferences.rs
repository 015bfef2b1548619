use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Alert Preferences - per-session toggles that survive reloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertPreferences {
    pub sound_enabled: bool,
    pub highlight_enabled: bool,
}

impl Default for AlertPreferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            highlight_enabled: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("preference file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored preferences, or the defaults for a session never saved.
    async fn load(&self, session_id: &str) -> Result<AlertPreferences, PreferenceError>;

    async fn save(&self, session_id: &str, preferences: &AlertPreferences) -> Result<(), PreferenceError>;
}

/// One `<session id>.json` file per session under `dir`.
pub struct JsonFilePreferenceStore {
    dir: PathBuf,
}

impl JsonFilePreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, PreferenceError> {
        let valid = !session_id.is_empty()
            && session_id.len() <= 128
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PreferenceError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn load(&self, session_id: &str) -> Result<AlertPreferences, PreferenceError> {
        let path = self.path_for(session_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AlertPreferences::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, session_id: &str, preferences: &AlertPreferences) -> Result<(), PreferenceError> {
        let path = self.path_for(session_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write then rename so a crash never leaves a half-written file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(preferences)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(session_id, path = %path.display(), "Saved alert preferences");
        Ok(())
    }
}
