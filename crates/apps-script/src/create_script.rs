//! create-script: new Apps Script project bound to a container document

use serde::{Deserialize, Serialize};

use crate::api::ScriptApi;
use crate::error::GatewayError;
use crate::operation::{Operation, RemoteFuture, required};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateScriptRequest {
    /// Drive id of the container (spreadsheet)
    #[serde(default, rename = "spreadsheetId", alias = "containerId")]
    pub container_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[cfg(test)]
impl CreateScriptRequest {
    pub(crate) fn new(container_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            container_id: Some(container_id.into()),
            title: Some(title.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateScriptResponse {
    pub script_id: String,
    pub url: String,
}

pub struct CreateScript;

impl Operation for CreateScript {
    type Request = CreateScriptRequest;
    type Response = CreateScriptResponse;

    fn name(&self) -> &'static str {
        "create-script"
    }

    fn validate(&self, request: &CreateScriptRequest) -> Result<(), GatewayError> {
        required(request.container_id.as_deref(), "spreadsheetId")?;
        required(request.title.as_deref(), "title")?;
        Ok(())
    }

    fn redacted_params(&self, request: &CreateScriptRequest) -> serde_json::Value {
        serde_json::json!({
            "spreadsheetId": request.container_id,
            "title": request.title,
        })
    }

    fn call<'a>(
        &'a self,
        api: &'a ScriptApi,
        access_token: &'a str,
        request: &'a CreateScriptRequest,
    ) -> RemoteFuture<'a, CreateScriptResponse> {
        Box::pin(async move {
            let container_id = request.container_id.as_deref().unwrap_or_default().trim();
            let title = request.title.as_deref().unwrap_or_default().trim();
            let script_id = api.create_project(access_token, title, container_id).await?;
            Ok(CreateScriptResponse {
                url: ScriptApi::editor_url(&script_id)?,
                script_id,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_http_body() {
        let request: CreateScriptRequest =
            serde_json::from_str(r#"{"spreadsheetId":"sheet-1","title":"Automation"}"#).unwrap();
        assert_eq!(request.container_id.as_deref(), Some("sheet-1"));
        assert!(CreateScript.validate(&request).is_ok());
    }

    #[test]
    fn missing_fields_are_named() {
        let no_container = CreateScriptRequest {
            container_id: None,
            title: Some("t".into()),
        };
        assert!(matches!(
            CreateScript.validate(&no_container),
            Err(GatewayError::InvalidRequest { field }) if field == "spreadsheetId"
        ));

        let blank_title = CreateScriptRequest::new("sheet-1", " ");
        assert!(matches!(
            CreateScript.validate(&blank_title),
            Err(GatewayError::InvalidRequest { field }) if field == "title"
        ));
    }

    #[test]
    fn response_serializes_camel_case() {
        let response = CreateScriptResponse {
            script_id: "abc".into(),
            url: ScriptApi::editor_url("abc").unwrap(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["scriptId"], "abc");
        assert_eq!(json["url"], "https://script.google.com/d/abc/edit");
    }
}
