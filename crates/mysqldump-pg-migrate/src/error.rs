//! Error types for the migration library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for migration operations.
///
/// Only fatal conditions are raised through this type. Per-table and
/// per-constraint failures are captured into the migration and constraint
/// reports instead.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, missing target, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The dump file does not exist.
    #[error("Dump file not found: {}", .0.display())]
    DumpNotFound(PathBuf),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Dump extraction could not complete (e.g. the blocking scan task died)
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_not_found_message() {
        let err = MigrateError::DumpNotFound(PathBuf::from("/tmp/missing.sql"));
        assert_eq!(err.to_string(), "Dump file not found: /tmp/missing.sql");
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = MigrateError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: denied"));
    }

    #[test]
    fn test_pool_error_context() {
        let err = MigrateError::pool("timed out", "opening session for legacy");
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("opening session for legacy"));
    }
}
