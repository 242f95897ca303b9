//! Google OAuth token lifecycle for the Apps Script relay
//!
//! Holds one OAuth identity on behalf of one operator:
//! 1. `TokenManager::initialize` loads the client identity and any persisted token
//! 2. `AuthorizationFlow::build_consent_url` produces the consent screen URL
//! 3. `AuthorizationFlow::complete_exchange` trades the returned code for tokens
//! 4. `TokenManager::adopt_new_credential` stores and persists them
//! 5. `TokenManager::access_token` refreshes before each privileged call
//! 6. `StatusReporter::report` exposes presence/validity for health checks

pub mod constants;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod identity;
pub mod manager;
pub mod status;
pub mod token;

pub use constants::*;
pub use credentials::{Credential, CredentialStore};
pub use error::{Error, Result};
pub use flow::{AuthorizationFlow, build_consent_url};
pub use identity::{ClientIdentity, IdentitySource};
pub use manager::{Adoption, OAuthEndpoints, TokenManager};
pub use status::{StatusReport, StatusReporter};
pub use token::{TokenResponse, exchange_code, refresh_access_token};
