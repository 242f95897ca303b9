//! Error types for the OAuth token lifecycle

/// Errors from identity loading, the authorization flow and token management.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("token manager not initialized: no client identity loaded")]
    NotInitialized,

    #[error("not authenticated: complete the authorization flow first")]
    NotAuthenticated,

    #[error("authorization code is required")]
    MissingCode,

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// Refresh grant rejected by the token endpoint (revoked or expired).
    #[error("refresh token rejected: {0}")]
    InvalidGrant(String),

    /// Refresh failed for a reason that may succeed on a later attempt.
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_carries_field() {
        let err = Error::Configuration("missing required field: client_secret".into());
        assert_eq!(
            err.to_string(),
            "configuration error: missing required field: client_secret"
        );
    }

    #[test]
    fn exchange_error_carries_reason() {
        let err = Error::TokenExchange("token endpoint returned 400: invalid_grant".into());
        assert!(err.to_string().contains("invalid_grant"));
    }
}
