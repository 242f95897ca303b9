//! Persisted OAuth credential
//!
//! The token file holds exactly one credential: the latest token set granted
//! to the relay's single identity. It is overwritten wholesale whenever a new
//! credential is adopted or refreshed. Writes use temp-file + rename so a
//! crash never leaves a half-written file, and a mutex serializes writers
//! so racing adoptions resolve as last-write-wins.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// A granted token set.
///
/// `expiry_date` is a unix timestamp in milliseconds (absolute), computed
/// from the token endpoint's `expires_in` delta when the token is received.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<u64>,
    /// Space-separated granted scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Credential {
    /// Granted scopes as individual identifiers.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Whether the access token expires within `margin_millis` of `now_millis`.
    /// A credential without an expiry is treated as non-expiring.
    pub fn expires_within(&self, now_millis: u64, margin_millis: u64) -> bool {
        match self.expiry_date {
            Some(expiry) => expiry <= now_millis.saturating_add(margin_millis),
            None => false,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry_date", &self.expiry_date)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// File-backed store for the single persisted credential.
pub struct CredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the token file currently exists on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the persisted credential.
    ///
    /// Returns `Ok(None)` when no file exists (first run). A file that exists
    /// but cannot be parsed is a `CredentialParse` error.
    pub async fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no persisted credential");
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
        let credential: Credential = serde_json::from_str(&contents)
            .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
        info!(
            path = %self.path.display(),
            has_refresh_token = credential.refresh_token.is_some(),
            "loaded persisted credential"
        );
        Ok(Some(credential))
    }

    /// Overwrite the token file with `credential`.
    pub async fn save(&self, credential: &Credential) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.path, credential).await
    }
}

/// Write the credential atomically with 0600 permissions.
async fn write_atomic(path: &Path, credential: &Credential) -> Result<()> {
    let json = serde_json::to_string_pretty(credential)
        .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let tmp_path = dir.join(format!(".token.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    if let Err(e) = finish_write(&tmp_path, path).await {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
            warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove temp credential file");
        }
        return Err(e);
    }

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}

/// Restrict permissions on the temp file, then move it into place.
async fn finish_write(tmp_path: &Path, path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))
}
