//! Privileged Apps Script operations behind the relay's OAuth credential
//!
//! Three operations share one contract (`Operation`) and one executor
//! (`Gateway`):
//! - create-script: new project bound to a spreadsheet
//! - push-content: replace a project's files
//! - run-function: execute a function and return its result

pub mod api;
pub mod create_script;
pub mod error;
pub mod gateway;
pub mod operation;
pub mod push_content;
pub mod run_function;

pub use api::{SCRIPT_API_URL, ScriptApi, ScriptFile};
pub use create_script::{CreateScript, CreateScriptRequest, CreateScriptResponse};
pub use error::{GatewayError, RemoteError, Result};
pub use gateway::Gateway;
pub use operation::Operation;
pub use push_content::{FileEntry, PushContent, PushContentRequest, PushContentResponse};
pub use run_function::{RunFunction, RunFunctionRequest, RunFunctionResponse};
