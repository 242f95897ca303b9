//! Shared types for the Apps Script relay workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
