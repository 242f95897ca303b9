//! Authorization code flow
//!
//! 1. `build_consent_url` sends the operator to the consent screen
//! 2. Google redirects back to the callback address with `?code=...`
//! 3. `complete_exchange` trades the code for tokens and hands them to the
//!    token manager, which persists them

use std::sync::Arc;

use tracing::{info, warn};

use crate::constants::SCOPES;
use crate::error::{Error, Result};
use crate::identity::ClientIdentity;
use crate::manager::{Adoption, TokenManager};
use crate::token;

#[derive(Clone)]
pub struct AuthorizationFlow {
    manager: Arc<TokenManager>,
}

impl AuthorizationFlow {
    pub fn new(manager: Arc<TokenManager>) -> Self {
        Self { manager }
    }

    /// Consent URL for the loaded identity. Fails with `NotInitialized`
    /// when no identity is loaded.
    pub fn build_consent_url(&self) -> Result<String> {
        let identity = self.manager.identity()?;
        build_consent_url(&self.manager.endpoints().authorize_url, identity)
    }

    /// Exchange `code` for tokens and adopt them.
    ///
    /// A blank code is rejected before any network call.
    pub async fn complete_exchange(&self, code: &str) -> Result<Adoption> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::MissingCode);
        }
        let identity = self.manager.identity()?;

        let tokens = token::exchange_code(
            self.manager.http_client(),
            &self.manager.endpoints().token_url,
            identity,
            code,
        )
        .await
        .inspect_err(|e| warn!(error = %e, "authorization code exchange failed"))?;

        let adoption = self.manager.adopt_new_credential(tokens).await?;
        info!(token_saved = adoption.token_saved, "authorization flow completed");
        Ok(adoption)
    }
}

/// Build the consent URL: offline access, the fixed scope set, and
/// incremental consent so previously granted scopes are kept.
pub fn build_consent_url(authorize_url: &str, identity: &ClientIdentity) -> Result<String> {
    let scope = SCOPES.join(" ");
    let url = reqwest::Url::parse_with_params(
        authorize_url,
        &[
            ("client_id", identity.client_id.as_str()),
            ("redirect_uri", identity.redirect_uri.as_str()),
            ("response_type", "code"),
            ("access_type", "offline"),
            ("include_granted_scopes", "true"),
            ("prompt", "consent"),
            ("scope", scope.as_str()),
        ],
    )
    .map_err(|e| Error::Configuration(format!("invalid authorize_url {authorize_url}: {e}")))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::AUTHORIZE_ENDPOINT;
    use crate::credentials::CredentialStore;
    use crate::identity::IdentitySource;
    use crate::manager::OAuthEndpoints;
    use crate::token::tests::{start_token_server, test_identity};
    use common::Secret;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    const IDENTITY: &str = r#"{"web":{"client_id":"id.apps.googleusercontent.com","client_secret":"GOCSPX-s","redirect_uris":["https://relay.example.com/callback"]}}"#;

    async fn flow_at(dir: &std::path::Path, token_url: &str, init: bool) -> AuthorizationFlow {
        let manager = TokenManager::new(
            CredentialStore::new(dir.join("token.json")),
            OAuthEndpoints {
                authorize_url: AUTHORIZE_ENDPOINT.into(),
                token_url: token_url.into(),
            },
            reqwest::Client::new(),
        );
        if init {
            manager
                .initialize(&IdentitySource::Inline(Secret::new(IDENTITY.into())), None)
                .await
                .unwrap();
        }
        AuthorizationFlow::new(Arc::new(manager))
    }

    fn query(url: &str) -> HashMap<String, String> {
        reqwest::Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn consent_url_requests_offline_access_and_all_scopes() {
        let url = build_consent_url(AUTHORIZE_ENDPOINT, &test_identity()).unwrap();
        assert!(url.starts_with(AUTHORIZE_ENDPOINT));

        let params = query(&url);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["include_granted_scopes"], "true");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "id.apps.googleusercontent.com");
        assert_eq!(params["redirect_uri"], "http://localhost:3000/callback");

        let scopes: Vec<&str> = params["scope"].split(' ').collect();
        assert_eq!(scopes, SCOPES.to_vec());
        for scope in ["script.projects", "script.scriptapp", "spreadsheets", "drive.scripts"] {
            assert!(url.contains(scope), "{scope} missing from {url}");
        }
    }

    #[test]
    fn consent_url_is_deterministic() {
        let identity = test_identity();
        assert_eq!(
            build_consent_url(AUTHORIZE_ENDPOINT, &identity).unwrap(),
            build_consent_url(AUTHORIZE_ENDPOINT, &identity).unwrap()
        );
    }

    #[test]
    fn invalid_authorize_url_is_configuration_error() {
        let result = build_consent_url("not a url", &test_identity());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn consent_url_requires_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let flow = flow_at(dir.path(), "http://127.0.0.1:1/token", false).await;
        assert!(matches!(flow.build_consent_url(), Err(Error::NotInitialized)));

        let dir = tempfile::tempdir().unwrap();
        let flow = flow_at(dir.path(), "http://127.0.0.1:1/token", true).await;
        let params = query(&flow.build_consent_url().unwrap());
        assert_eq!(params["redirect_uri"], "https://relay.example.com/callback");
    }

    #[tokio::test]
    async fn blank_code_fails_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let (url, hits) = start_token_server().await;
        let flow = flow_at(dir.path(), &url, true).await;

        assert!(matches!(flow.complete_exchange("").await, Err(Error::MissingCode)));
        assert!(matches!(flow.complete_exchange("  ").await, Err(Error::MissingCode)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_exchange_adopts_credential() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _) = start_token_server().await;
        let flow = flow_at(dir.path(), &url, true).await;

        let adoption = flow.complete_exchange("good-code").await.unwrap();
        assert!(adoption.token_saved);
        assert!(flow.manager.is_authenticated().await);
        assert_eq!(
            flow.manager.current_credential().await.unwrap().access_token,
            "ya29.exchanged"
        );
    }

    #[tokio::test]
    async fn rejected_code_is_token_exchange_error() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _) = start_token_server().await;
        let flow = flow_at(dir.path(), &url, true).await;

        let result = flow.complete_exchange("fabricated").await;
        assert!(matches!(result, Err(Error::TokenExchange(_))), "got {result:?}");
        assert!(!flow.manager.is_authenticated().await);
        assert!(!flow.manager.credential_store_present());
    }

    #[tokio::test]
    async fn response_without_access_token_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _) = start_token_server().await;
        let flow = flow_at(dir.path(), &url, true).await;

        let result = flow.complete_exchange("no-access").await;
        assert!(matches!(result, Err(Error::InvalidTokenResponse(_))));
    }

    #[tokio::test]
    async fn exchange_requires_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let (url, hits) = start_token_server().await;
        let flow = flow_at(dir.path(), &url, false).await;

        assert!(matches!(
            flow.complete_exchange("good-code").await,
            Err(Error::NotInitialized)
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
