//! Configuration types and loading
//!
//! Precedence: env vars > config file > defaults. The config file is
//! optional; a relay can run from env vars alone. The client identity JSON
//! is read from `GOOGLE_CREDENTIALS` when set, otherwise from
//! `oauth.credentials_path`. It is never placed in the TOML.

use common::Secret;
use google_auth::{AUTHORIZE_ENDPOINT, IdentitySource, OAuthEndpoints, TOKEN_ENDPOINT};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "script-relay.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub endpoints: EndpointsConfig,
    /// Identity JSON from `GOOGLE_CREDENTIALS`
    #[serde(skip)]
    pub inline_identity: Option<Secret<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Bound on every outbound call (token endpoint and Apps Script API)
    pub timeout_secs: u64,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            timeout_secs: 30,
            max_connections: 256,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Client identity file (client secrets JSON), read-only
    pub credentials_path: PathBuf,
    /// Granted token file, rewritten on every new credential
    pub token_path: PathBuf,
    /// Externally reachable callback address; overrides the identity's
    /// `redirect_uris`
    pub redirect_uri: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            redirect_uri: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub script_api_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_ENDPOINT.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
            script_api_url: apps_script::SCRIPT_API_URL.to_string(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file, overlay env vars, validate.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let mut config: Config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        if let Some(json) = non_empty_env("GOOGLE_CREDENTIALS") {
            self.inline_identity = Some(Secret::new(json));
        }
        if let Some(path) = non_empty_env("GOOGLE_CREDENTIALS_PATH") {
            self.oauth.credentials_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("TOKEN_PATH") {
            self.oauth.token_path = PathBuf::from(path);
        }
        if let Some(uri) = non_empty_env("REDIRECT_URI") {
            self.oauth.redirect_uri = Some(uri);
        }
        if let Some(port) = non_empty_env("PORT") {
            let port: u16 = port.trim().parse().map_err(|e| {
                common::Error::Config(format!("PORT must be a port number, got {port:?}: {e}"))
            })?;
            self.server.listen_addr.set_port(port);
        }
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        for (name, url) in [
            ("authorize_url", &self.endpoints.authorize_url),
            ("token_url", &self.endpoints.token_url),
            ("script_api_url", &self.endpoints.script_api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }
        if self.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Where the client identity comes from: inline JSON wins over the file.
    pub fn identity_source(&self) -> IdentitySource {
        match &self.inline_identity {
            Some(json) => IdentitySource::Inline(json.clone()),
            None => IdentitySource::File(self.oauth.credentials_path.clone()),
        }
    }

    pub fn oauth_endpoints(&self) -> OAuthEndpoints {
        OAuthEndpoints {
            authorize_url: self.endpoints.authorize_url.clone(),
            token_url: self.endpoints.token_url.clone(),
        }
    }

    /// Config file from CLI arg, then `CONFIG_PATH`, then `script-relay.toml`
    /// if it exists. `None` means run on defaults and env vars.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.is_file().then_some(default)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
