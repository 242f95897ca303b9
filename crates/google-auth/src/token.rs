//! Token endpoint calls: authorization code exchange and refresh
//!
//! Both POST a form to the token endpoint with different grant types. The
//! endpoint URL is passed in so tests and alternate deployments can point
//! at a different server.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::identity::ClientIdentity;

/// Token endpoint reply for both exchange and refresh.
///
/// Every field is optional on the wire: Google omits `refresh_token` on
/// refresh and on repeat consents, and a reply without `access_token` is
/// rejected when adopted rather than when decoded.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Convert to a stored credential, computing the absolute expiry.
    ///
    /// `previous_refresh` is kept when the response carries no refresh token.
    pub fn into_credential(
        self,
        now_millis: u64,
        previous_refresh: Option<String>,
    ) -> Result<Credential> {
        let access_token = match self.access_token {
            Some(token) if !token.trim().is_empty() => token,
            _ => {
                return Err(Error::InvalidTokenResponse(
                    "response did not include an access token".into(),
                ));
            }
        };
        Ok(Credential {
            access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expiry_date: self
                .expires_in
                .map(|secs| now_millis.saturating_add(secs.saturating_mul(1000))),
            scope: self.scope,
            token_type: self.token_type,
        })
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// OAuth error body (`{"error": "...", "error_description": "..."}`).
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenErrorBody {
    fn describe(&self) -> String {
        match &self.error_description {
            Some(desc) => format!("{}: {desc}", self.error),
            None => self.error.clone(),
        }
    }
}

/// Current wall clock as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Exchange an authorization code for tokens.
///
/// Every failure (transport, timeout, non-success status, undecodable body)
/// is a `TokenExchange` error carrying the reason.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    identity: &ClientIdentity,
    code: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", identity.client_id.as_str()),
            ("client_secret", identity.client_secret.expose().as_str()),
            ("redirect_uri", identity.redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::TokenExchange(transport_reason("token exchange", &e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        let reason = serde_json::from_str::<TokenErrorBody>(&body)
            .map(|err| err.describe())
            .unwrap_or(body);
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {reason}"
        )));
    }

    debug!("authorization code exchanged");
    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("undecodable token response: {e}")))
}

/// Refresh an access token.
///
/// `invalid_grant`, 401 and 403 mean the refresh token is revoked or expired
/// and map to `InvalidGrant`; anything else is a transient `TokenRefresh`.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    token_url: &str,
    identity: &ClientIdentity,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", identity.client_id.as_str()),
            ("client_secret", identity.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::TokenRefresh(transport_reason("token refresh", &e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        let parsed = serde_json::from_str::<TokenErrorBody>(&body).ok();
        let revoked = status.as_u16() == 401
            || status.as_u16() == 403
            || parsed.as_ref().is_some_and(|e| e.error == "invalid_grant");
        let reason = parsed.map(|e| e.describe()).unwrap_or(body);

        if revoked {
            return Err(Error::InvalidGrant(format!("{status}: {reason}")));
        }
        return Err(Error::TokenRefresh(format!(
            "token endpoint returned {status}: {reason}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenRefresh(format!("undecodable refresh response: {e}")))
}

fn transport_reason(what: &str, err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("{what} request timed out: {err}")
    } else {
        format!("{what} request failed: {err}")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// Local token endpoint. Accepts code `good-code` and refresh token
    /// `1//good-refresh`; `1//revoked` gets `invalid_grant`, `1//flaky` a 503.
    pub(crate) async fn start_token_server() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/token",
            post(move |axum::Form(form): axum::Form<HashMap<String, String>>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let grant = form.get("grant_type").map(String::as_str);
                    match (grant, form.get("code"), form.get("refresh_token")) {
                        (Some("authorization_code"), Some(code), _) if code == "good-code" => (
                            StatusCode::OK,
                            axum::Json(serde_json::json!({
                                "access_token": "ya29.exchanged",
                                "refresh_token": "1//exchanged",
                                "expires_in": 3599,
                                "scope": "https://www.googleapis.com/auth/script.projects",
                                "token_type": "Bearer"
                            })),
                        ),
                        (Some("authorization_code"), Some(code), _) if code == "no-access" => (
                            StatusCode::OK,
                            axum::Json(serde_json::json!({"expires_in": 3599})),
                        ),
                        (Some("refresh_token"), _, Some(rt)) if rt == "1//good-refresh" => (
                            StatusCode::OK,
                            axum::Json(serde_json::json!({
                                "access_token": "ya29.refreshed",
                                "expires_in": 3599,
                                "token_type": "Bearer"
                            })),
                        ),
                        (Some("refresh_token"), _, Some(rt)) if rt == "1//flaky" => (
                            StatusCode::SERVICE_UNAVAILABLE,
                            axum::Json(serde_json::json!({"error": "backend_error"})),
                        ),
                        _ => (
                            StatusCode::BAD_REQUEST,
                            axum::Json(serde_json::json!({
                                "error": "invalid_grant",
                                "error_description": "Bad Request"
                            })),
                        ),
                    }
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/token"), hits)
    }

    pub(crate) fn test_identity() -> ClientIdentity {
        ClientIdentity::parse(
            r#"{"installed":{"client_id":"id.apps.googleusercontent.com","client_secret":"GOCSPX-s","redirect_uris":["http://localhost:3000/callback"]}}"#,
            None,
        )
        .unwrap()
    }

    #[test]
    fn token_response_deserializes_google_shape() {
        let json = r#"{"access_token":"ya29.a","expires_in":3599,"refresh_token":"1//r","scope":"s1 s2","token_type":"Bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token.as_deref(), Some("ya29.a"));
        assert_eq!(token.expires_in, Some(3599));
    }

    #[test]
    fn into_credential_computes_absolute_expiry() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"ya29.a","expires_in":10}"#).unwrap();
        let credential = token.into_credential(1_000, Some("1//old".into())).unwrap();
        assert_eq!(credential.expiry_date, Some(11_000));
        assert_eq!(credential.refresh_token.as_deref(), Some("1//old"));
    }

    #[test]
    fn into_credential_prefers_new_refresh_token() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":"1//new"}"#).unwrap();
        let credential = token.into_credential(0, Some("1//old".into())).unwrap();
        assert_eq!(credential.refresh_token.as_deref(), Some("1//new"));
        assert_eq!(credential.expiry_date, None);
    }

    #[test]
    fn into_credential_rejects_missing_access_token() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":""}"#).unwrap();
        assert!(matches!(
            token.into_credential(0, None),
            Err(Error::InvalidTokenResponse(_))
        ));
    }

    #[tokio::test]
    async fn exchange_code_returns_tokens() {
        let (url, hits) = start_token_server().await;
        let client = reqwest::Client::new();
        let token = exchange_code(&client, &url, &test_identity(), "good-code")
            .await
            .unwrap();
        assert_eq!(token.access_token.as_deref(), Some("ya29.exchanged"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exchange_code_rejects_invalid_code() {
        let (url, _) = start_token_server().await;
        let client = reqwest::Client::new();
        let err = exchange_code(&client, &url, &test_identity(), "bogus")
            .await
            .unwrap_err();
        match err {
            Error::TokenExchange(msg) => {
                assert!(msg.contains("400"), "got: {msg}");
                assert!(msg.contains("invalid_grant"), "got: {msg}");
            }
            other => panic!("expected TokenExchange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exchange_transport_failure_is_token_exchange_error() {
        let client = reqwest::Client::new();
        let err = exchange_code(&client, "http://127.0.0.1:1/token", &test_identity(), "c")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn refresh_classifies_revoked_and_transient() {
        let (url, _) = start_token_server().await;
        let client = reqwest::Client::new();
        let identity = test_identity();

        let ok = refresh_access_token(&client, &url, &identity, "1//good-refresh")
            .await
            .unwrap();
        assert_eq!(ok.access_token.as_deref(), Some("ya29.refreshed"));
        assert!(ok.refresh_token.is_none());

        let revoked = refresh_access_token(&client, &url, &identity, "1//revoked").await;
        assert!(matches!(revoked, Err(Error::InvalidGrant(_))), "got {revoked:?}");

        let flaky = refresh_access_token(&client, &url, &identity, "1//flaky").await;
        assert!(matches!(flaky, Err(Error::TokenRefresh(_))), "got {flaky:?}");
    }
}
