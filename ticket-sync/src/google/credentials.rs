//! OAuth client secrets and the persisted token store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::AuthError;

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// The OAuth client this application signs in as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Layout of the file downloaded from the cloud console.
#[derive(Deserialize)]
struct SecretsFile {
    #[serde(alias = "web")]
    installed: ClientSecrets,
}

impl ClientSecrets {
    /// Load the client secrets file (`installed` or `web` section).
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let secrets_error = |message: String| AuthError::Secrets {
            path: path.to_path_buf(),
            message,
        };

        let text = std::fs::read_to_string(path).map_err(|e| secrets_error(e.to_string()))?;
        let file: SecretsFile =
            serde_json::from_str(&text).map_err(|e| secrets_error(e.to_string()))?;
        if file.installed.client_id.trim().is_empty() {
            return Err(secrets_error("client_id is empty".to_string()));
        }
        Ok(file.installed)
    }
}

/// Authorization state as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    /// Whether the access token is expired or about to expire at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now
    }

    /// Whether this token was granted every scope in `required`.
    pub fn covers(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }
}

/// The JSON file holding the current [`StoredToken`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored token.
    ///
    /// A missing file is `None`. An unreadable or malformed file is logged
    /// and also `None`, which leads to a fresh sign-in.
    pub fn load(&self) -> Option<StoredToken> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read token store");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed token store");
                None
            }
        }
    }

    pub fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        let store_error = |message: String| AuthError::TokenStore {
            path: self.path.clone(),
            message,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| store_error(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(token).map_err(|e| store_error(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| store_error(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| store_error(e.to_string()))?;
        Ok(())
    }

    /// Remove the stored token. A missing file is not an error.
    pub fn delete(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "deleted token store");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::TokenStore {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn token(expires_at: DateTime<Utc>) -> StoredToken {
        StoredToken {
            access_token: "ya29.token".into(),
            refresh_token: Some("1//refresh".into()),
            expires_at,
            scopes: vec!["scope-a".into()],
        }
    }

    #[test]
    fn load_installed_secrets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"installed":{"client_id":"id.apps.googleusercontent.com","client_secret":"s",
                "auth_uri":"https://accounts.google.com/o/oauth2/auth",
                "token_uri":"https://oauth2.googleapis.com/token",
                "redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();

        let secrets = ClientSecrets::load(&path).unwrap();
        assert_eq!(secrets.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn load_web_secrets_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"web":{"client_id":"id","client_secret":"s"}}"#).unwrap();

        let secrets = ClientSecrets::load(&path).unwrap();
        assert_eq!(secrets.auth_uri, DEFAULT_AUTH_URI);
    }

    #[test]
    fn bad_secrets_are_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        assert!(matches!(ClientSecrets::load(&path), Err(AuthError::Secrets { .. })));

        std::fs::write(&path, r#"{"other":{}}"#).unwrap();
        assert!(matches!(ClientSecrets::load(&path), Err(AuthError::Secrets { .. })));
    }

    #[test]
    fn expiry_margin() {
        let now = Utc::now();
        assert!(token(now).is_expired(now));
        assert!(token(now + Duration::seconds(30)).is_expired(now));
        assert!(!token(now + Duration::seconds(120)).is_expired(now));
    }

    #[test]
    fn scope_coverage() {
        let token = token(Utc::now());
        assert!(token.covers(&["scope-a".to_string()]));
        assert!(!token.covers(&["scope-a".to_string(), "scope-b".to_string()]));
    }

    #[test]
    fn store_roundtrip_and_delete() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("token.json"));
        assert_eq!(store.load(), None);

        let saved = token(Utc::now());
        store.save(&saved).unwrap();
        assert_eq!(store.load(), Some(saved));

        store.delete().unwrap();
        assert_eq!(store.load(), None);
        store.delete().unwrap();
    }

    #[test]
    fn malformed_store_is_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{").unwrap();
        assert_eq!(TokenStore::new(path).load(), None);
    }
}
