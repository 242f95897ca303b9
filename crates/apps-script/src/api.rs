//! Apps Script REST API client
//!
//! Thin wrapper over the three endpoints the relay uses. Every call carries
//! the bearer token it is given and is bounded by the client's timeout.
//! Nothing here retries.

use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::RemoteError;

/// Production API root
pub const SCRIPT_API_URL: &str = "https://script.googleapis.com";

/// Editor URL template root; the project id and `/edit` are appended.
pub const SCRIPT_EDITOR_URL: &str = "https://script.google.com/d";

/// One source file as sent to `projects.updateContent`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScriptFile {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub source: String,
}

#[derive(Clone)]
pub struct ScriptApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ScriptApi {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Editor URL for a project; the id is percent-encoded as a path segment.
    pub fn editor_url(script_id: &str) -> Result<String, RemoteError> {
        join_segments(SCRIPT_EDITOR_URL, &[script_id, "edit"]).map(String::from)
    }

    /// `POST /v1/projects`: create a project bound to `parent_id`.
    /// Returns the new script id.
    pub async fn create_project(
        &self,
        access_token: &str,
        title: &str,
        parent_id: &str,
    ) -> Result<String, RemoteError> {
        let url = self.endpoint(&["v1", "projects"])?;
        let body = serde_json::json!({ "title": title, "parentId": parent_id });
        let reply = self
            .send(self.client.post(url).bearer_auth(access_token).json(&body))
            .await?;

        reply
            .get("scriptId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| RemoteError::Decode("create response has no scriptId".into()))
    }

    /// `PUT /v1/projects/{id}/content`: replace the project's files.
    /// Returns the number of files the platform reports back.
    pub async fn update_content(
        &self,
        access_token: &str,
        script_id: &str,
        files: &[ScriptFile],
    ) -> Result<usize, RemoteError> {
        let url = self.endpoint(&["v1", "projects", script_id, "content"])?;
        let body = serde_json::json!({ "files": files });
        let reply = self
            .send(self.client.put(url).bearer_auth(access_token).json(&body))
            .await?;

        Ok(reply
            .get("files")
            .and_then(Value::as_array)
            .map_or(0, Vec::len))
    }

    /// `POST /v1/scripts/{id}:run`: execute a function.
    ///
    /// Returns the execution `response` object. A reply carrying an `error`
    /// object (the function threw) is a `Script` error.
    pub async fn run(
        &self,
        access_token: &str,
        script_id: &str,
        function: &str,
        parameters: &[Value],
        dev_mode: bool,
    ) -> Result<Value, RemoteError> {
        let target = format!("{script_id}:run");
        let url = self.endpoint(&["v1", "scripts", &target])?;
        let body = serde_json::json!({
            "function": function,
            "parameters": parameters,
            "devMode": dev_mode,
        });
        let mut reply = self
            .send(self.client.post(url).bearer_auth(access_token).json(&body))
            .await?;

        if let Some(error) = reply.get("error") {
            return Err(RemoteError::Script(script_error_message(error)));
        }
        Ok(reply.get_mut("response").map(Value::take).unwrap_or(Value::Null))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        join_segments(&self.base_url, segments)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, RemoteError> {
        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout(self.timeout)
            } else {
                RemoteError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout(self.timeout)
            } else {
                RemoteError::Transport(format!("reading response body: {e}"))
            }
        })?;
        debug!(status = status.as_u16(), bytes = body.len(), "Apps Script API replied");

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Append percent-encoded path segments to `base`.
fn join_segments(base: &str, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = Url::parse(base).map_err(|e| RemoteError::Url(format!("{base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| RemoteError::Url(format!("{base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// `error.message` from a Google API error body, else the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| {
            if body.is_empty() {
                String::from("<no body>")
            } else {
                body.to_string()
            }
        })
}

/// Prefer the script's own exception text over the generic "ScriptError".
fn script_error_message(error: &Value) -> String {
    error
        .pointer("/details/0/errorMessage")
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("script execution failed")
        .to_string()
}
