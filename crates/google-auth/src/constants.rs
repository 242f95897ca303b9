//! Google OAuth endpoints and the fixed scope set
//!
//! Endpoints are defaults; the service config can point them elsewhere
//! (staging, local test servers).

/// Consent screen endpoint
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Token endpoint for code exchange and refresh
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Create and update Apps Script projects
pub const SCOPE_SCRIPT_PROJECTS: &str = "https://www.googleapis.com/auth/script.projects";

/// Execute Apps Script functions
pub const SCOPE_SCRIPT_EXECUTION: &str = "https://www.googleapis.com/auth/script.scriptapp";

/// Read/write the spreadsheets scripts are bound to
pub const SCOPE_SPREADSHEETS: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Access script files stored in Drive
pub const SCOPE_DRIVE_SCRIPTS: &str = "https://www.googleapis.com/auth/drive.scripts";

/// Every scope requested on the consent screen, in request order.
pub const SCOPES: [&str; 4] = [
    SCOPE_SCRIPT_PROJECTS,
    SCOPE_SCRIPT_EXECUTION,
    SCOPE_SPREADSHEETS,
    SCOPE_DRIVE_SCRIPTS,
];

/// Access tokens expiring within this window are refreshed before use.
pub const REFRESH_MARGIN_MILLIS: u64 = 60_000;
