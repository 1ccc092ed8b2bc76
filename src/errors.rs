//! Typed error hierarchy for the bulk engine.
//!
//! Four enums follow the failure taxonomy of a run:
//! - `PlaybookError`: configuration problems, fatal before any repository is touched
//! - `GatewayError`: remote hosting API failures (search, pull requests, issues)
//! - `WorktreeError`: local working-copy failures (clone, commit, push)
//! - `OperationError`: a single operation step failing to plan or apply

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a playbook.
#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("Failed to read playbook at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Playbook is not valid YAML for the playbook schema: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unsupported playbook version {0} (expected 1)")]
    UnsupportedVersion(u32),

    #[error("Invalid playbook field `{field}`: {message}")]
    Invalid { field: String, message: String },

    #[error("ops[{index}]: unknown operation `{id}` (not a built-in and not a script path)")]
    UnknownOperation { index: usize, id: String },
}

impl PlaybookError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors from the remote repository gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Rate limit still exceeded after {retries} retries: {body}")]
    RateLimited { retries: u32, body: String },

    #[error("Unexpected GitHub response: {0}")]
    Decode(String),
}

/// Errors from the local working-copy manager.
#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("`git {command}` failed: {stderr}")]
    GitFailed { command: String, stderr: String },

    #[error("Failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Blocking git task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Errors from executing an operation step.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Missing required input `{0}`")]
    MissingInput(&'static str),

    #[error("Invalid input `{field}`: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Script exited with code {code}: {stderr}")]
    ScriptFailed { code: i32, stderr: String },

    #[error("Script produced invalid JSON output: {message}; stderr: {stderr}")]
    InvalidOutput { message: String, stderr: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
