//! Authenticated operation gateway
//!
//! Runs any `Operation` against the Apps Script API using the token
//! manager's current credential.

use std::sync::Arc;

use google_auth::TokenManager;
use tracing::{debug, info, instrument, warn};

use crate::api::ScriptApi;
use crate::create_script::{CreateScript, CreateScriptRequest, CreateScriptResponse};
use crate::error::{GatewayError, Result};
use crate::operation::Operation;
use crate::push_content::{PushContent, PushContentRequest, PushContentResponse};
use crate::run_function::{RunFunction, RunFunctionRequest, RunFunctionResponse};

#[derive(Clone)]
pub struct Gateway {
    tokens: Arc<TokenManager>,
    api: ScriptApi,
}

impl Gateway {
    pub fn new(tokens: Arc<TokenManager>, api: ScriptApi) -> Self {
        Self { tokens, api }
    }

    /// Authenticate-gate, validate, then make the operation's single call.
    ///
    /// The auth and validation checks happen before any network I/O. The
    /// token fetch may refresh an expiring access token first.
    #[instrument(skip_all, fields(operation = op.name()))]
    pub async fn execute<O: Operation>(&self, op: &O, request: &O::Request) -> Result<O::Response> {
        self.ensure_authenticated().await?;
        op.validate(request)?;

        let access_token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(google_auth::Error::NotAuthenticated) => {
                return Err(GatewayError::NotAuthenticated);
            }
            Err(e) => {
                return Err(GatewayError::RemoteOperation {
                    operation: op.name(),
                    params: op.redacted_params(request),
                    message: e.to_string(),
                });
            }
        };

        match op.call(&self.api, &access_token, request).await {
            Ok(response) => {
                info!("operation succeeded");
                Ok(response)
            }
            Err(e) => {
                let params = op.redacted_params(request);
                warn!(error = %e, %params, "operation failed");
                Err(GatewayError::RemoteOperation {
                    operation: op.name(),
                    params,
                    message: e.to_string(),
                })
            }
        }
    }

    /// `NotAuthenticated` unless a usable credential is held. No I/O.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        if self.tokens.is_authenticated().await {
            Ok(())
        } else {
            debug!("rejected: not authenticated");
            Err(GatewayError::NotAuthenticated)
        }
    }

    pub async fn create_script(&self, request: &CreateScriptRequest) -> Result<CreateScriptResponse> {
        self.execute(&CreateScript, request).await
    }

    pub async fn push_content(&self, request: &PushContentRequest) -> Result<PushContentResponse> {
        self.execute(&PushContent, request).await
    }

    pub async fn run_function(&self, request: &RunFunctionRequest) -> Result<RunFunctionResponse> {
        self.execute(&RunFunction, request).await
    }
}
