//! Credential status for health checks

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::identity::IdentitySource;
use crate::manager::TokenManager;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub authenticated: bool,
    pub credential_store_present: bool,
    pub client_identity_loaded: bool,
    /// False for inline identities
    pub identity_file_present: bool,
    /// RFC 3339, UTC
    pub timestamp: String,
}

/// Read-only view over the token manager. Never fails and never performs
/// network I/O; `authenticated` reflects in-memory state only.
#[derive(Clone)]
pub struct StatusReporter {
    manager: Arc<TokenManager>,
    identity_file: Option<PathBuf>,
}

impl StatusReporter {
    pub fn new(manager: Arc<TokenManager>, identity_source: &IdentitySource) -> Self {
        Self {
            manager,
            identity_file: identity_source.file_path().map(|p| p.to_path_buf()),
        }
    }

    pub async fn report(&self) -> StatusReport {
        let client_identity_loaded = self.manager.is_initialized();
        // A credential without an identity cannot be refreshed or exchanged.
        let authenticated = client_identity_loaded && self.manager.is_authenticated().await;

        StatusReport {
            authenticated,
            credential_store_present: self.manager.credential_store_present(),
            client_identity_loaded,
            identity_file_present: self.identity_file.as_ref().is_some_and(|p| p.is_file()),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
