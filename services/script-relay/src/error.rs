//! HTTP error mapping
//!
//! Every failure a handler can produce becomes a status code plus a JSON body
//! of the form `{"error": {"kind", "message", "request_id"}}`.

use apps_script::GatewayError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] google_auth::Error),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Body that is not valid JSON for the route's request type.
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        use google_auth::Error as Auth;
        match self {
            ApiError::Auth(Auth::Configuration(_)) => "ConfigurationError",
            ApiError::Auth(Auth::NotInitialized) => "NotInitializedError",
            ApiError::Auth(Auth::NotAuthenticated | Auth::InvalidGrant(_)) => {
                "NotAuthenticatedError"
            }
            ApiError::Auth(Auth::MissingCode) => "MissingCodeError",
            ApiError::Auth(Auth::TokenExchange(_)) => "TokenExchangeError",
            ApiError::Auth(Auth::InvalidTokenResponse(_)) => "InvalidTokenResponseError",
            ApiError::Auth(Auth::TokenRefresh(_)) => "TokenRefreshError",
            ApiError::Auth(Auth::CredentialParse(_) | Auth::Io(_)) => "InternalError",
            ApiError::Gateway(GatewayError::NotAuthenticated) => "NotAuthenticatedError",
            ApiError::Gateway(GatewayError::InvalidRequest { .. }) => "InvalidRequestError",
            ApiError::Gateway(GatewayError::RemoteOperation { .. }) => "RemoteOperationError",
            ApiError::MalformedBody(_) => "InvalidRequestError",
        }
    }

    /// 400 for caller input, 500 for everything else. An unauthenticated
    /// relay is a server-side condition; `kind` tells it apart.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            "MissingCodeError" | "InvalidRequestError" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric outcome label for this error.
    pub fn outcome(&self) -> &'static str {
        match self.kind() {
            "MissingCodeError" | "InvalidRequestError" => "invalid_request",
            "NotAuthenticatedError" => "not_authenticated",
            _ => "error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let status = self.status();
        let mut error = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "request_id": request_id,
        });
        if let ApiError::Gateway(GatewayError::RemoteOperation {
            operation, params, ..
        }) = &self
        {
            error["operation"] = serde_json::Value::from(*operation);
            error["params"] = params.clone();
        }

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::warn!(request_id = %request_id, kind = self.kind(), error = %self, "request rejected");
        }

        (status, Json(serde_json::json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                google_auth::Error::NotInitialized.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "NotInitializedError",
            ),
            (
                google_auth::Error::MissingCode.into(),
                StatusCode::BAD_REQUEST,
                "MissingCodeError",
            ),
            (
                google_auth::Error::TokenExchange("400".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "TokenExchangeError",
            ),
            (
                GatewayError::NotAuthenticated.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "NotAuthenticatedError",
            ),
            (
                google_auth::Error::InvalidGrant("revoked".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "NotAuthenticatedError",
            ),
            (
                GatewayError::invalid("scriptId").into(),
                StatusCode::BAD_REQUEST,
                "InvalidRequestError",
            ),
            (
                ApiError::MalformedBody("expected value".into()),
                StatusCode::BAD_REQUEST,
                "InvalidRequestError",
            ),
        ];
        for (err, status, kind) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status(), status, "{kind}");
        }
    }

    #[test]
    fn outcome_labels_follow_kind() {
        assert_eq!(ApiError::from(GatewayError::NotAuthenticated).outcome(), "not_authenticated");
        assert_eq!(ApiError::from(GatewayError::invalid("title")).outcome(), "invalid_request");
        assert_eq!(ApiError::from(google_auth::Error::NotInitialized).outcome(), "error");
    }

    #[tokio::test]
    async fn body_carries_kind_message_and_request_id() {
        let (status, json) = body_json(GatewayError::invalid("function").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["kind"], "InvalidRequestError");
        assert_eq!(json["error"]["message"], "missing or invalid field: function");
        let request_id = json["error"]["request_id"].as_str().unwrap();
        assert!(request_id.starts_with("req_"), "got: {request_id}");
    }

    #[tokio::test]
    async fn remote_failure_body_names_operation() {
        let err = GatewayError::RemoteOperation {
            operation: "create-script",
            params: serde_json::json!({"spreadsheetId": "S", "title": "T"}),
            message: "Apps Script API returned 404: not found".into(),
        };
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["kind"], "RemoteOperationError");
        assert_eq!(json["error"]["operation"], "create-script");
        assert_eq!(json["error"]["params"]["spreadsheetId"], "S");
    }
}
