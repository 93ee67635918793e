//! Access token persistence
//!
//! `querydeck login` stores the backend's bearer token in
//! `$XDG_DATA_HOME/querydeck/token.json`. A token is honoured for 24 hours
//! after login; after that it is treated as absent and removed.
//! `logout` simply deletes the file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;

/// Lifetime of a stored token
pub const TOKEN_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// A bearer token plus who it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub username: Option<String>,
    /// Tenant id; dashboards are saved under it
    #[serde(default)]
    pub client_id: Option<i64>,
}

impl StoredToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// File-backed token store
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$XDG_DATA_HOME/querydeck/token.json`
    pub fn default_location() -> Self {
        Self::new(Config::token_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a freshly issued token
    pub fn save(
        &self,
        access_token: &str,
        username: Option<&str>,
        client_id: Option<i64>,
    ) -> Result<StoredToken> {
        self.save_at(access_token, username, client_id, Utc::now())
    }

    fn save_at(
        &self,
        access_token: &str,
        username: Option<&str>,
        client_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<StoredToken> {
        let token = StoredToken {
            access_token: access_token.to_string(),
            expires_at: now + Duration::seconds(TOKEN_MAX_AGE_SECS),
            username: username.map(str::to_string),
            client_id,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&token)?)?;
        restrict_permissions(&self.path)?;

        tracing::info!(path = %self.path.display(), "Stored access token");
        Ok(token)
    }

    /// The stored token, or `None` when absent or expired
    pub fn load(&self) -> Result<Option<StoredToken>> {
        self.load_at(Utc::now())
    }

    fn load_at(&self, now: DateTime<Utc>) -> Result<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read(&self.path)?;
        let token: StoredToken = match serde_json::from_slice(&content) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable token file");
                self.clear()?;
                return Ok(None);
            }
        };

        if token.is_expired_at(now) {
            tracing::info!(expired_at = %token.expires_at, "Stored access token expired");
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(token))
    }

    /// Forget the stored token. Returns true if one was removed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("nested").join("token.json"))
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let saved = store.save("abc", Some("ana@example.com"), Some(4)).unwrap();
        let loaded = store.load().unwrap().expect("token should be present");

        assert_eq!(loaded, saved);
        assert_eq!(loaded.client_id, Some(4));
    }

    #[test]
    fn test_token_expires_after_a_day() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let issued = Utc::now() - Duration::hours(25);

        store.save_at("abc", None, None, issued).unwrap();

        assert!(store.load_at(Utc::now()).unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_token_valid_just_before_expiry() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let issued = Utc::now();

        store.save_at("abc", None, None, issued).unwrap();

        let almost = issued + Duration::seconds(TOKEN_MAX_AGE_SECS - 1);
        assert!(store.load_at(almost).unwrap().is_some());
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(!store.clear().unwrap());
        store.save("abc", None, None).unwrap();
        assert!(store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());
    }
}
