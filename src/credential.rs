//! Caller-supplied API credentials and the single persisted key.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// Opaque, non-empty API key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidInput("credential must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedCredential {
    football_api_key: Option<String>,
}

/// JSON file holding at most one key: the saved football API credential.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means nothing saved. A blank saved value is treated the same.
    pub fn load(&self) -> Result<Option<Credential>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let saved: SavedCredential = serde_json::from_str(&raw)?;
        Ok(saved.football_api_key.and_then(|k| Credential::new(k).ok()))
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        let saved = SavedCredential {
            football_api_key: Some(credential.expose().to_string()),
        };
        fs::write(&self.path, serde_json::to_vec_pretty(&saved)?)?;
        info!(path = %self.path.display(), "Saved API credential");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Removed saved API credential");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved credential to remove");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Explicit configuration wins over the saved key.
    pub fn resolve(&self, configured: Option<&str>) -> Result<Option<Credential>> {
        match configured {
            Some(raw) => Credential::new(raw).map(Some),
            None => self.load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_credential_rejected() {
        assert!(matches!(Credential::new("  "), Err(AppError::InvalidInput(_))));
        assert_eq!(Credential::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn debug_redacts_value() {
        let c = Credential::new("secret-key").unwrap();
        assert!(!format!("{c:?}").contains("secret"));
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credential.json"));

        assert!(store.load().unwrap().is_none());

        store.save(&Credential::new("abc").unwrap()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().expose(), "abc");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn configured_key_wins_over_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credential.json"));
        store.save(&Credential::new("saved").unwrap()).unwrap();

        assert_eq!(store.resolve(Some("env")).unwrap().unwrap().expose(), "env");
        assert_eq!(store.resolve(None).unwrap().unwrap().expose(), "saved");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(CredentialStore::new(path).load(), Err(AppError::Json(_))));
    }
}
