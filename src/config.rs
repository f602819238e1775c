//! Credential record persisted as `config.json` in the data directory.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub token: String,
    pub login: String,
    /// Time of the last successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(token: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            login: login.into(),
            synced_at: None,
        }
    }

    /// Load credentials from `path`.
    ///
    /// A missing file is `ConfigMissing`; a file that is not a valid record
    /// (or carries an empty token) is `ConfigCorrupt`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigMissing);
            }
            Err(e) => return Err(e.into()),
        };

        let creds: Self = serde_json::from_slice(&bytes)
            .map_err(|_| Error::ConfigCorrupt(path.to_path_buf()))?;
        if creds.token.trim().is_empty() {
            return Err(Error::ConfigCorrupt(path.to_path_buf()));
        }
        Ok(creds)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let creds = Credentials::new("ghp_secret", "octocat");

        creds.save(&path).unwrap();
        assert_eq!(Credentials::load(&path).unwrap(), creds);
    }

    #[test]
    fn missing_file_is_config_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Credentials::load(&tmp.path().join("config.json"));
        assert!(matches!(err, Err(Error::ConfigMissing)));
    }

    #[test]
    fn garbage_is_config_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            Credentials::load(&path),
            Err(Error::ConfigCorrupt(_))
        ));
    }

    #[test]
    fn empty_token_is_config_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"token":"","login":"octocat"}"#).unwrap();

        assert!(matches!(
            Credentials::load(&path),
            Err(Error::ConfigCorrupt(_))
        ));
    }
}
