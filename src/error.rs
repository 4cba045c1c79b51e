use std::path::PathBuf;
use thiserror::Error;

use crate::formats::ParseError;

#[derive(Error, Debug)]
pub enum ExtDataError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown source '{0}'")]
    UnknownSource(String),

    #[error("No suitable connector found for the given parameters")]
    NoConnector,

    #[error("IO error at '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    StdIoError(#[from] std::io::Error),

    #[error("KDL parse error: {0}")]
    KdlError(#[from] kdl::KdlError),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    YamlError(#[from] serde_yml::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Remote resource fetch error (HTTP, network, empty body, etc.)
    #[error("Failed to fetch '{target}': {reason}")]
    Connection { target: String, reason: String },

    /// Parameter rejected before the operation was attempted
    #[error("Invalid value for '{param}': {reason}")]
    Validation { param: String, reason: String },

    #[error("Request to '{target}' throttled until {not_before}; {}", throttle_outcome(.stale_served))]
    Throttled {
        target: String,
        not_before: i64,
        stale_served: bool,
    },

    #[error("Stale cached value served for '{target}': {reason}")]
    StaleServed { target: String, reason: String },

    #[error("System command '{command}' failed: {reason}")]
    SystemCommandFailed { command: String, reason: String },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),

    /// Lock acquisition failed
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    /// Path resolution or validation error
    #[error("Path error: {0}")]
    PathError(String),

    #[error("{0}")]
    Other(String),
}

impl ExtDataError {
    /// Whether the error only degrades the result instead of losing it.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            ExtDataError::StaleServed { .. }
                | ExtDataError::Throttled {
                    stale_served: true,
                    ..
                }
        )
    }
}

fn throttle_outcome(stale_served: &bool) -> &'static str {
    if *stale_served {
        "stale value served"
    } else {
        "nothing cached"
    }
}

pub type Result<T> = std::result::Result<T, ExtDataError>;
