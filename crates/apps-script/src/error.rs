//! Error types for privileged operations

use std::time::Duration;

/// Failure of a single Apps Script API call.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("Apps Script API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("undecodable response: {0}")]
    Decode(String),

    /// The function ran and threw.
    #[error("script error: {0}")]
    Script(String),

    #[error("invalid API URL: {0}")]
    Url(String),
}

/// Errors surfaced by the gateway to its callers.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("not authenticated: complete the authorization flow first")]
    NotAuthenticated,

    #[error("missing or invalid field: {field}")]
    InvalidRequest { field: String },

    /// `params` is the request with secrets and file bodies stripped.
    #[error("{operation} failed: {message}")]
    RemoteOperation {
        operation: &'static str,
        params: serde_json::Value,
        message: String,
    },
}

impl GatewayError {
    pub fn invalid(field: impl Into<String>) -> Self {
        GatewayError::InvalidRequest {
            field: field.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_duration() {
        let err = RemoteError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "request timed out after 1.5s");
    }

    #[test]
    fn invalid_request_names_field() {
        let err = GatewayError::invalid("spreadsheetId");
        assert_eq!(err.to_string(), "missing or invalid field: spreadsheetId");
    }

    #[test]
    fn remote_operation_carries_operation_name() {
        let err = GatewayError::RemoteOperation {
            operation: "run-function",
            params: serde_json::json!({"scriptId": "X"}),
            message: "script error: boom".into(),
        };
        assert_eq!(err.to_string(), "run-function failed: script error: boom");
    }
}
