use chrono::{ Duration, Utc };
use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Serialize, Deserialize)]
struct StoredToken {
    token: String,
    expires_at: i64,
}

/// Persisted anonymous client identity. The token scopes every API call to
/// one installation; it is created on first access, reused until it expires,
/// and never destroyed by this client.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the stored token, minting and persisting a fresh one when the
    /// file is missing, unreadable, or past its expiry.
    pub fn get_or_create(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        if let Some(token) = self.read_valid_token() {
            return Ok(token);
        }

        let token = Uuid::new_v4().to_string();
        let stored = StoredToken {
            token: token.clone(),
            expires_at: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string(&stored)?)?;
        info!("Issued new session token (stored at {})", self.path.display());

        Ok(token)
    }

    pub fn clear(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn read_valid_token(&self) -> Option<String> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let stored: StoredToken = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!("Session token file {} is corrupt, reissuing: {}", self.path.display(), e);
                return None;
            }
        };
        if stored.expires_at <= Utc::now().timestamp() {
            info!("Session token expired, reissuing");
            return None;
        }
        Some(stored.token)
    }
}
