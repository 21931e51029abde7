use std::path::PathBuf;

use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Error during file I/O operations
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization
    #[error("json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    /// Error when user input fails.
    #[error("inquire error: {0}")]
    Inquire(#[from] inquire::InquireError),
    /// External program is not installed or not on PATH
    #[error("'{0}' not found, make sure it is installed and on your PATH")]
    ToolNotFound(String),
    /// Error when a local repository cannot be inspected
    #[error("failed to inspect repository: {0}")]
    Inspection(String),
    /// Transport or authentication failure talking to GitHub
    #[error("github error: {0}")]
    Registry(String),
    /// Requested repository does not exist
    #[error("repository not found: '{0}'")]
    RepositoryNotFound(String),
    /// Repository exists but cannot be used for syncing
    #[error("repository '{name}' cannot be used for syncing: {reason}")]
    RepositoryInvalid { name: String, reason: String },
    /// On-disk state failed to parse or validate
    #[error("corrupt state file {}: {reason}", path.display())]
    ConfigCorrupt { path: PathBuf, reason: String },
    /// Error when no config directory could be determined
    #[error("failed to determine the configuration directory")]
    ConfigDirNotFound,
    /// Placeholder commit could not be created
    #[error("failed to write placeholder commit: {0}")]
    CommitWrite(String),
    /// Push still conflicting after retrying with the resolved branch
    #[error("push rejected after retry: {0}")]
    PushConflict(String),
    /// Error during input validation.
    #[error("validation error: {0}")]
    Validation(String),
}
