//! Error taxonomy for the maintenance core.
//!
//! Tool failures are data (`CommandResult`), not errors. `StewardError`
//! covers the cases where steward itself cannot proceed: a tool that
//! could not be invoked at all, output that cannot be parsed, or a
//! manifest that cannot be read or rewritten.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StewardError {
    #[error("failed to invoke '{command}': {status}")]
    Execution { command: String, status: &'static str },

    #[error("could not parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("remediation cannot be planned: {0}")]
    Plan(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StewardError>;
