//! push-content: replace a project's source files

use serde::{Deserialize, Serialize};

use crate::api::{ScriptApi, ScriptFile};
use crate::error::GatewayError;
use crate::operation::{Operation, RemoteFuture, required};

/// File type used when an entry does not name one.
pub const DEFAULT_FILE_TYPE: &str = "SERVER_JS";

const FILE_TYPES: [&str; 3] = ["SERVER_JS", "HTML", "JSON"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "content")]
    pub source: Option<String>,
    #[serde(default, rename = "type")]
    pub file_type: Option<String>,
}

#[cfg(test)]
impl FileEntry {
    pub(crate) fn new(name: impl Into<String>, source: impl Into<String>, file_type: &str) -> Self {
        Self {
            name: Some(name.into()),
            source: Some(source.into()),
            file_type: Some(file_type.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushContentRequest {
    #[serde(default, rename = "scriptId")]
    pub script_id: Option<String>,
    /// Ordered; the platform keeps the order given.
    #[serde(default)]
    pub files: Option<Vec<FileEntry>>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PushContentResponse {
    pub updated_files: usize,
}

pub struct PushContent;

/// Canonical file type, or None if unsupported. Blank means the default.
fn normalize_type(file_type: Option<&str>) -> Option<&'static str> {
    match file_type.map(str::trim) {
        None | Some("") => Some(DEFAULT_FILE_TYPE),
        Some(t) => FILE_TYPES
            .into_iter()
            .find(|known| known.eq_ignore_ascii_case(t)),
    }
}

impl Operation for PushContent {
    type Request = PushContentRequest;
    type Response = PushContentResponse;

    fn name(&self) -> &'static str {
        "push-content"
    }

    fn validate(&self, request: &PushContentRequest) -> Result<(), GatewayError> {
        required(request.script_id.as_deref(), "scriptId")?;
        let files = request
            .files
            .as_ref()
            .ok_or_else(|| GatewayError::invalid("files"))?;

        for (i, file) in files.iter().enumerate() {
            required(file.name.as_deref(), &format!("files[{i}].name"))?;
            if file.source.is_none() {
                return Err(GatewayError::invalid(format!("files[{i}].source")));
            }
            if normalize_type(file.file_type.as_deref()).is_none() {
                return Err(GatewayError::invalid(format!("files[{i}].type")));
            }
        }
        Ok(())
    }

    fn redacted_params(&self, request: &PushContentRequest) -> serde_json::Value {
        let files: Vec<serde_json::Value> = request
            .files
            .iter()
            .flatten()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "type": f.file_type,
                    "sourceBytes": f.source.as_ref().map(String::len),
                })
            })
            .collect();
        serde_json::json!({ "scriptId": request.script_id, "files": files })
    }

    fn call<'a>(
        &'a self,
        api: &'a ScriptApi,
        access_token: &'a str,
        request: &'a PushContentRequest,
    ) -> RemoteFuture<'a, PushContentResponse> {
        Box::pin(async move {
            let script_id = request.script_id.as_deref().unwrap_or_default().trim();
            let files: Vec<ScriptFile> = request
                .files
                .iter()
                .flatten()
                .map(|f| ScriptFile {
                    name: f.name.as_deref().unwrap_or_default().trim().to_string(),
                    file_type: normalize_type(f.file_type.as_deref())
                        .unwrap_or(DEFAULT_FILE_TYPE)
                        .to_string(),
                    source: f.source.clone().unwrap_or_default(),
                })
                .collect();

            let updated_files = api.update_content(access_token, script_id, &files).await?;
            Ok(PushContentResponse { updated_files })
        })
    }
}
