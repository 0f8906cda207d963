//! Persisted credential source
//!
//! Credentials are kept in a JSON file next to the other per-user data and
//! are only written on an explicit save.

use std::path::{Path, PathBuf};

use crate::config::project_dirs;
use crate::error::{Error, Result};
use crate::protocol::credentials::CredentialSet;

const CREDENTIALS_FILE: &str = "credentials.json";

/// Loads and saves the Credential Set
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform data directory
    pub fn default_location() -> Result<Self> {
        let dirs = project_dirs()
            .ok_or_else(|| Error::Config("no home directory for credential storage".into()))?;
        Ok(Self::new(dirs.data_dir().join(CREDENTIALS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved set, or an empty one if nothing was saved yet
    pub fn load(&self) -> Result<CredentialSet> {
        if !self.path.exists() {
            return Ok(CredentialSet::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let credentials: CredentialSet = serde_json::from_str(&text).map_err(|e| {
            Error::Config(format!("unreadable credentials in {}: {}", self.path.display(), e))
        })?;
        Ok(credentials)
    }

    /// Trim and write the set back
    pub fn save(&self, credentials: &CredentialSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&credentials.trimmed())
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(&self.path, text)?;
        tracing::info!("Credentials saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::credentials::CredentialSlot;

    #[test]
    fn test_missing_file_is_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        assert_eq!(store.load().unwrap(), CredentialSet::new());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested").join("credentials.json"));

        let credentials = CredentialSet::new()
            .with(CredentialSlot::SpeechTranscription, " aai ")
            .with(CredentialSlot::Narration, "murf-key");
        store.save(&credentials).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.get(CredentialSlot::SpeechTranscription), Some("aai"));
        assert_eq!(loaded.get(CredentialSlot::Narration), Some("murf-key"));
        assert_eq!(loaded.get(CredentialSlot::Weather), None);
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = CredentialStore::new(path).load().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
