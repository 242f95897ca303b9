//! run-function: execute a named function in a deployed project

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ScriptApi;
use crate::error::GatewayError;
use crate::operation::{Operation, RemoteFuture, required};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunFunctionRequest {
    #[serde(default, rename = "scriptId")]
    pub script_id: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    /// Positional arguments; absent means none.
    #[serde(default)]
    pub parameters: Vec<Value>,
    /// Run the most recently saved code instead of the deployed version.
    #[serde(default, rename = "devMode")]
    pub dev_mode: bool,
}

#[cfg(test)]
impl RunFunctionRequest {
    pub(crate) fn new(script_id: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            script_id: Some(script_id.into()),
            function: Some(function.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunFunctionResponse {
    /// Execution response as produced by the platform (carries `result`).
    pub response: Value,
}

pub struct RunFunction;

impl Operation for RunFunction {
    type Request = RunFunctionRequest;
    type Response = RunFunctionResponse;

    fn name(&self) -> &'static str {
        "run-function"
    }

    fn validate(&self, request: &RunFunctionRequest) -> Result<(), GatewayError> {
        required(request.script_id.as_deref(), "scriptId")?;
        required(request.function.as_deref(), "function")?;
        Ok(())
    }

    fn redacted_params(&self, request: &RunFunctionRequest) -> Value {
        serde_json::json!({
            "scriptId": request.script_id,
            "function": request.function,
            "parameterCount": request.parameters.len(),
            "devMode": request.dev_mode,
        })
    }

    fn call<'a>(
        &'a self,
        api: &'a ScriptApi,
        access_token: &'a str,
        request: &'a RunFunctionRequest,
    ) -> RemoteFuture<'a, RunFunctionResponse> {
        Box::pin(async move {
            let response = api
                .run(
                    access_token,
                    request.script_id.as_deref().unwrap_or_default().trim(),
                    request.function.as_deref().unwrap_or_default().trim(),
                    &request.parameters,
                    request.dev_mode,
                )
                .await?;
            Ok(RunFunctionResponse { response })
        })
    }
}
