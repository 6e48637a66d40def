//! OAuth token storage.
//!
//! Tokens are kept in a JSON file next to other calpost data and cached in
//! memory. Writes go through a temporary file and a rename so a crash never
//! leaves a half-written token file behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GoogleError, GoogleResult};

/// Seconds shaved off the advertised lifetime so refresh happens early.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Information about an OAuth token set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires (with the safety margin applied).
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the tokens were last obtained or refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates a new token info from OAuth response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.and_then(expiry_from_now),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    ///
    /// Tokens without an expiry are treated as valid.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns true if the token has the required scopes.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Returns true if the tokens can be used now or after a refresh.
    pub fn is_usable(&self) -> bool {
        !self.is_expired() || self.refresh_token.is_some()
    }

    /// Returns the token to send to the revocation endpoint.
    ///
    /// Revoking the refresh token also invalidates every access token
    /// issued from it, so it is preferred.
    pub fn revocable_token(&self) -> &str {
        self.refresh_token.as_deref().unwrap_or(&self.access_token)
    }

    /// Updates the access token after a refresh.
    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs.and_then(expiry_from_now);
        self.last_refresh = Utc::now();
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|at| at - Utc::now())
    }
}

/// Lifetimes chrono cannot represent are treated as unknown.
fn expiry_from_now(secs: i64) -> Option<DateTime<Utc>> {
    let lifetime = Duration::try_seconds(secs.saturating_sub(EXPIRY_MARGIN_SECS))?;
    Utc::now().checked_add_signed(lifetime)
}

/// Persisted token storage with a file backend.
#[derive(Debug)]
pub struct TokenStorage {
    path: PathBuf,
    tokens: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    /// Creates a new token storage at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokens: RwLock::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<TokenInfo>> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<TokenInfo>> {
        self.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads tokens from disk into memory.
    ///
    /// Returns Ok(true) if tokens were loaded, Ok(false) if no tokens exist.
    pub fn load(&self) -> GoogleResult<bool> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            GoogleError::storage(format!("failed to read token file: {}", e)).with_source(e)
        })?;

        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            GoogleError::storage(format!("failed to parse token file: {}", e)).with_source(e)
        })?;

        debug!("loaded tokens from {:?}", self.path);
        *self.write() = Some(tokens);
        Ok(true)
    }

    /// Saves the current tokens to disk.
    pub fn save(&self) -> GoogleResult<()> {
        let content = {
            let tokens = self.read();
            let tokens = tokens
                .as_ref()
                .ok_or_else(|| GoogleError::internal("no tokens to save"))?;
            serde_json::to_string_pretty(tokens).map_err(|e| {
                GoogleError::internal(format!("failed to serialize tokens: {}", e))
            })?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GoogleError::storage(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content).map_err(|e| {
            GoogleError::storage(format!("failed to write token file: {}", e)).with_source(e)
        })?;

        // Tighten permissions before the file becomes visible under its real name.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            GoogleError::storage(format!("failed to rename token file: {}", e)).with_source(e)
        })?;

        debug!("saved tokens to {:?}", self.path);
        Ok(())
    }

    /// Returns a clone of the current tokens, if any.
    pub fn get(&self) -> Option<TokenInfo> {
        self.read().clone()
    }

    /// Sets new tokens and saves them to disk.
    pub fn set(&self, tokens: TokenInfo) -> GoogleResult<()> {
        *self.write() = Some(tokens);
        self.save()
    }

    /// Updates the access token and saves to disk.
    pub fn update_access_token(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) -> GoogleResult<()> {
        {
            let mut tokens = self.write();
            let tokens = tokens
                .as_mut()
                .ok_or_else(|| GoogleError::internal("no tokens to update"))?;
            tokens.update_access_token(access_token, expires_in_secs);
        }
        self.save()
    }

    /// Clears the stored tokens (both in memory and on disk).
    ///
    /// Returns true if a token file was removed.
    pub fn clear(&self) -> GoogleResult<bool> {
        *self.write() = None;
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| {
            GoogleError::storage(format!("failed to remove token file: {}", e)).with_source(e)
        })?;
        info!("removed tokens at {:?}", self.path);
        Ok(true)
    }

    /// Returns the token storage path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the stored tokens can be used now or after a refresh.
    pub fn has_usable_tokens(&self) -> bool {
        self.read().as_ref().is_some_and(TokenInfo::is_usable)
    }

    /// Returns true if re-authentication is needed.
    ///
    /// That is the case without tokens, or when the stored tokens lack one
    /// of the required scopes.
    pub fn needs_reauth(&self, required_scopes: &[String]) -> bool {
        match self.read().as_ref() {
            None => true,
            Some(tokens) => !tokens.has_scopes(required_scopes),
        }
    }
}
