//! Error handling module
//!
//! Provides unified error types and handling for the entire audit library.

use thiserror::Error;

/// Library-wide error type
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dependency cycle detected at migration {0}")]
    DependencyCycle(String),

    #[error("Invalid migration script {path}: {reason}")]
    Script { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

/// Helper function to create a script error
pub fn script_error(path: impl Into<String>, reason: impl Into<String>) -> AuditError {
    AuditError::Script {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Helper function to create a configuration error
pub fn config_error(msg: impl Into<String>) -> AuditError {
    AuditError::Config(msg.into())
}
