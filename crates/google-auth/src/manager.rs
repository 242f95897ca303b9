//! Token lifecycle manager
//!
//! Owns the relay's single credential. State transitions:
//! - `initialize` loads the client identity, then hydrates and probes any
//!   persisted credential
//! - `adopt_new_credential` replaces the credential after a code exchange
//! - `access_token` refreshes an expiring token before it is used
//! - a rejected refresh grant clears the access token (refresh token kept)
//!
//! Reads take a short `RwLock` read guard. Refresh is serialized by its own
//! mutex so concurrent privileged calls trigger a single token request.

use std::sync::OnceLock;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::constants::{AUTHORIZE_ENDPOINT, REFRESH_MARGIN_MILLIS, TOKEN_ENDPOINT};
use crate::credentials::{Credential, CredentialStore};
use crate::error::{Error, Result};
use crate::identity::{ClientIdentity, IdentitySource};
use crate::token::{self, TokenResponse, now_millis};

/// OAuth endpoint URLs.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize_url: String,
    pub token_url: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_ENDPOINT.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
        }
    }
}

/// Outcome of adopting a new credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adoption {
    /// False when the credential is live in memory but could not be written.
    pub token_saved: bool,
}

pub struct TokenManager {
    identity: OnceLock<ClientIdentity>,
    credential: RwLock<Option<Credential>>,
    refresh_lock: Mutex<()>,
    store: CredentialStore,
    endpoints: OAuthEndpoints,
    http_client: reqwest::Client,
}

impl TokenManager {
    pub fn new(
        store: CredentialStore,
        endpoints: OAuthEndpoints,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            identity: OnceLock::new(),
            credential: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            store,
            endpoints,
            http_client,
        }
    }

    /// Load the client identity and any persisted credential.
    ///
    /// Fails only on a missing or malformed identity. An unreadable token
    /// file or a credential that fails the probe leaves the manager
    /// initialized but unauthenticated.
    pub async fn initialize(
        &self,
        source: &IdentitySource,
        redirect_override: Option<&str>,
    ) -> Result<()> {
        let identity = ClientIdentity::load(source, redirect_override).await?;
        info!(
            client_id = %identity.client_id,
            redirect_uri = %identity.redirect_uri,
            "client identity loaded"
        );
        if self.identity.set(identity).is_err() {
            warn!("client identity already loaded, keeping the original");
        }

        match self.store.load().await {
            Ok(Some(credential)) => {
                *self.credential.write().await = Some(credential);
                match self.access_token().await {
                    Ok(_) => info!("persisted credential is usable"),
                    Err(e) => {
                        warn!(error = %e, "persisted credential failed validation, authorization required");
                    }
                }
            }
            Ok(None) => info!("no credential yet, authorization required"),
            Err(e) => {
                error!(
                    path = %self.store.path().display(),
                    error = %e,
                    "persisted credential unreadable, authorization required"
                );
            }
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.identity.get().is_some()
    }

    /// The loaded client identity.
    pub fn identity(&self) -> Result<&ClientIdentity> {
        self.identity.get().ok_or(Error::NotInitialized)
    }

    /// Whether a usable access token is held. No I/O.
    ///
    /// An expired token still counts when a refresh token is held, since
    /// `access_token` will refresh it on next use.
    pub async fn is_authenticated(&self) -> bool {
        self.credential
            .read()
            .await
            .as_ref()
            .is_some_and(|c| is_usable(c, now_millis()))
    }

    /// Clone of the current credential. No I/O.
    pub async fn current_credential(&self) -> Result<Credential> {
        self.credential
            .read()
            .await
            .as_ref()
            .filter(|c| is_usable(c, now_millis()))
            .cloned()
            .ok_or(Error::NotAuthenticated)
    }

    /// Access token ready for a privileged call, refreshing it first if it
    /// expires within the refresh margin.
    pub async fn access_token(&self) -> Result<String> {
        let credential = self.current_credential().await?;
        if !credential.expires_within(now_millis(), REFRESH_MARGIN_MILLIS) {
            return Ok(credential.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        let credential = self.current_credential().await?;
        let now = now_millis();
        if !credential.expires_within(now, REFRESH_MARGIN_MILLIS) {
            return Ok(credential.access_token);
        }
        let Some(refresh) = credential.refresh_token.clone() else {
            // Within the margin but not yet expired; nothing to refresh with.
            return Ok(credential.access_token);
        };

        let identity = self.identity()?;
        match token::refresh_access_token(
            &self.http_client,
            &self.endpoints.token_url,
            identity,
            &refresh,
        )
        .await
        {
            Ok(tokens) => {
                let refreshed = tokens
                    .into_credential(now_millis(), Some(refresh))
                    .map_err(|e| Error::TokenRefresh(e.to_string()))?;
                let access = refreshed.access_token.clone();
                *self.credential.write().await = Some(refreshed.clone());
                if let Err(e) = self.store.save(&refreshed).await {
                    warn!(error = %e, "failed to persist refreshed credential");
                }
                info!("access token refreshed");
                Ok(access)
            }
            Err(Error::InvalidGrant(reason)) => {
                warn!(error = %reason, "refresh token rejected, credential no longer usable");
                let mut state = self.credential.write().await;
                if let Some(current) = state.as_mut() {
                    // Leave a concurrently adopted credential alone.
                    if current.refresh_token.as_deref() == Some(refresh.as_str()) {
                        current.access_token.clear();
                        current.expiry_date = None;
                    }
                }
                Err(Error::NotAuthenticated)
            }
            Err(e) if !credential.expires_within(now_millis(), 0) => {
                warn!(error = %e, "token refresh failed, using current access token until expiry");
                Ok(credential.access_token)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                Err(e)
            }
        }
    }

    /// Replace the current credential with a freshly exchanged token set and
    /// persist it before returning.
    pub async fn adopt_new_credential(&self, tokens: TokenResponse) -> Result<Adoption> {
        let previous_refresh = self
            .credential
            .read()
            .await
            .as_ref()
            .and_then(|c| c.refresh_token.clone());
        let credential = tokens.into_credential(now_millis(), previous_refresh)?;

        *self.credential.write().await = Some(credential.clone());

        let token_saved = match self.store.save(&credential).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    path = %self.store.path().display(),
                    error = %e,
                    "credential adopted but not persisted"
                );
                false
            }
        };
        info!(
            token_saved,
            scopes = credential.scopes().len(),
            has_refresh_token = credential.refresh_token.is_some(),
            "adopted new credential"
        );
        Ok(Adoption { token_saved })
    }

    /// Whether the token file exists on disk.
    pub fn credential_store_present(&self) -> bool {
        self.store.exists()
    }

    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

fn is_usable(credential: &Credential, now_millis: u64) -> bool {
    !credential.access_token.is_empty()
        && (credential.refresh_token.is_some() || !credential.expires_within(now_millis, 0))
}
