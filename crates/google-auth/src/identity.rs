//! OAuth client identity (client id, secret, callback address)
//!
//! The operator provides the identity out of band, either as the client
//! secrets JSON downloaded from the Google Cloud console (`installed` or
//! `web` wrapper) or as a flat object with the same field names. The
//! identity is loaded once and never changes for the process lifetime.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Where the client identity JSON comes from.
#[derive(Debug, Clone)]
pub enum IdentitySource {
    /// JSON supplied directly (e.g. via `GOOGLE_CREDENTIALS`)
    Inline(Secret<String>),
    /// Path to a client secrets file
    File(PathBuf),
}

impl IdentitySource {
    /// Path of the identity file, if this source is file-backed.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            IdentitySource::Inline(_) => None,
            IdentitySource::File(path) => Some(path),
        }
    }
}

/// Validated OAuth client identity. All fields are non-empty.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawClient {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(default)]
    installed: Option<RawClient>,
    #[serde(default)]
    web: Option<RawClient>,
    #[serde(flatten)]
    flat: RawClient,
}

impl ClientIdentity {
    /// Read and validate the identity from `source`.
    ///
    /// `redirect_override` replaces whatever callback address the JSON
    /// carries; blank overrides are ignored.
    pub async fn load(source: &IdentitySource, redirect_override: Option<&str>) -> Result<Self> {
        match source {
            IdentitySource::Inline(json) if json.is_blank() => Err(Error::Configuration(
                "inline client identity is empty".into(),
            )),
            IdentitySource::Inline(json) => Self::parse(json.expose(), redirect_override),
            IdentitySource::File(path) => {
                let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::Configuration(format!(
                        "reading client identity file {}: {e}",
                        path.display()
                    ))
                })?;
                Self::parse(&contents, redirect_override)
            }
        }
    }

    /// Parse and validate identity JSON.
    pub fn parse(json: &str, redirect_override: Option<&str>) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json).map_err(|e| {
            Error::Configuration(format!("client identity is not a valid JSON object: {e}"))
        })?;
        let client = file.installed.or(file.web).unwrap_or(file.flat);

        let client_id = required("client_id", client.client_id)?;
        let client_secret = required("client_secret", client.client_secret)?;

        let redirect_uri = redirect_override
            .filter(|uri| !uri.trim().is_empty())
            .map(str::to_owned)
            .or(client.redirect_uri)
            .or_else(|| {
                client
                    .redirect_uris
                    .into_iter()
                    .find(|uri| !uri.trim().is_empty())
            });
        let redirect_uri = required("redirect_uri", redirect_uri)?;

        Ok(Self {
            client_id,
            client_secret: Secret::new(client_secret),
            redirect_uri,
        })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_owned()),
        _ => Err(Error::Configuration(format!(
            "missing required field: {field}"
        ))),
    }
}
