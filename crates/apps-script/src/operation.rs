//! Authenticated operation abstraction
//!
//! Every privileged call has the same shape: check authentication, validate
//! input, make exactly one remote call, wrap any failure with the operation
//! name and redacted parameters. Implementors supply the three varying
//! pieces; `Gateway::execute` supplies the sequence.
//!
//! Uses `Pin<Box<dyn Future>>` so operations stay usable behind `dyn`.

use std::future::Future;
use std::pin::Pin;

use crate::api::ScriptApi;
use crate::error::{GatewayError, RemoteError};

pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

pub trait Operation: Send + Sync {
    type Request: Send + Sync;
    type Response: Send;

    /// Name used in logs, metrics and `RemoteOperation` errors
    /// (e.g. "create-script").
    fn name(&self) -> &'static str;

    /// Reject requests missing required fields. Runs before any I/O.
    fn validate(&self, request: &Self::Request) -> Result<(), GatewayError>;

    /// Request parameters safe to log and return in errors.
    fn redacted_params(&self, request: &Self::Request) -> serde_json::Value;

    /// The single remote call. Only invoked on validated requests.
    fn call<'a>(
        &'a self,
        api: &'a ScriptApi,
        access_token: &'a str,
        request: &'a Self::Request,
    ) -> RemoteFuture<'a, Self::Response>;
}

/// Trimmed, non-empty string field or `InvalidRequest` naming it.
pub(crate) fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, GatewayError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GatewayError::invalid(field)),
    }
}
