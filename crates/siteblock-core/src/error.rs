//! Core error types for siteblock-core.
//!
//! This module defines the error hierarchy using thiserror. Store failures
//! always propagate to the caller; nothing in the core turns a persistence
//! problem into an implicit allow or block.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for siteblock-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Usage store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Rule list management errors
    #[error("{0}")]
    Rule(#[from] RuleError),

    /// Password and recovery errors
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Browser host errors (tab lookup, reload, redirect)
    #[error("Host error: {0}")]
    Host(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Usage store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The backing database is locked by another writer
    #[error("Store is locked")]
    Locked,

    /// A stored value does not have the expected shape
    #[error("Malformed value for key '{key}': {message}")]
    Malformed { key: String, message: String },

    /// The store refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Rule list errors. These are user-facing and non-fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Please enter a URL")]
    EmptySite,

    #[error("Website already blocked")]
    AlreadyBlocked(String),

    #[error("Website already has a time limit")]
    AlreadyTimeLimited(String),

    #[error("Please enter a valid time limit")]
    InvalidLimit(i64),

    #[error("No rule found for '{0}'")]
    NotFound(String),
}

/// Password and recovery errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Please set a password first")]
    NoPassword,

    #[error("Please enter a password")]
    EmptyPassword,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Please select a security question")]
    MissingQuestion,

    #[error("Unknown security question '{0}'")]
    UnknownQuestion(String),

    #[error("Please answer the security question")]
    MissingAnswer,

    /// Recovery is impossible; the caller should offer a full data reset.
    #[error("No security question set. You must reset all data.")]
    NoSecurityQuestion,

    #[error("Incorrect answer to security question")]
    IncorrectAnswer,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Could not resolve or create the data directory
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Store(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
