use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::UserData;

const PROFILE_FILE: &str = "profile.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// The record mirrored to local disk between runs: the last signed-in user
/// plus presentation preferences. A cache and bootstrap only — access
/// control always keys off the provider's session, never this file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user: Option<UserData>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "es".to_string()
}

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("Could not access local profile: {0}")]
    Io(#[from] io::Error),
    #[error("Could not serialize local profile: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A small key-value mirror on local disk
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join(PROFILE_FILE),
        }
    }

    /// Loads the profile record. A missing or unreadable file yields the
    /// default record, since this is only a cache.
    pub fn load(&self) -> ProfileRecord {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_else(|| ProfileRecord {
                language: default_language(),
                ..Default::default()
            })
    }

    pub fn save(&self, record: &ProfileRecord) -> Result<(), LocalStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let raw = serde_json::to_string_pretty(record)?;
        fs::write(&self.path, raw)?;

        Ok(())
    }

    /// Mirrors the signed-in user, keeping preferences intact
    pub fn remember_user(&self, user: &UserData) -> Result<(), LocalStoreError> {
        let mut record = self.load();
        record.user = Some(user.clone());
        self.save(&record)
    }

    /// Drops the mirrored user, keeping preferences intact
    pub fn clear_user(&self) -> Result<(), LocalStoreError> {
        let mut record = self.load();
        record.user = None;
        self.save(&record)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn user() -> UserData {
        UserData {
            id: "u1".to_string(),
            name: "Alex".to_string(),
            email: "alex@example.com".to_string(),
            picture: String::new(),
        }
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());

        let record = local.load();
        assert!(record.user.is_none());
        assert_eq!(record.language, "es");
    }

    #[test]
    fn test_remember_and_clear_user() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());

        local.remember_user(&user()).unwrap();
        assert_eq!(local.load().user.unwrap().id, "u1");

        local.clear_user().unwrap();
        assert!(local.load().user.is_none());
    }

    #[test]
    fn test_preferences_survive_user_changes() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());

        let mut record = local.load();
        record.theme = Theme::Light;
        local.save(&record).unwrap();

        local.remember_user(&user()).unwrap();
        local.clear_user().unwrap();

        assert_eq!(local.load().theme, Theme::Light);
    }
}
