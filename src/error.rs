//! Error types for the upgrade engine.

use crate::compare::SchemaComparisonResult;
use thiserror::Error;

/// Main error type for schema upgrade operations.
#[derive(Error, Debug)]
pub enum UpgradeError {
    /// Configuration error (invalid YAML, missing fields, duplicate handlers,
    /// dependency cycles, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema comparison violated the active reconciliation policy.
    #[error("Schema comparison failed: {}", .0.brief())]
    Synchronization(Box<SchemaComparisonResult>),

    /// A stored extension version was rejected by its handler's version gate.
    #[error("Extension '{package}' (handler {handler}) cannot upgrade from version {stored} to {current}")]
    IncompatibleVersion {
        package: String,
        handler: String,
        stored: String,
        current: String,
    },

    /// Schema extraction failed
    #[error("Schema extraction failed: {0}")]
    Extraction(String),

    /// A background task died before producing its result
    #[error("Background task failed: {0}")]
    Background(String),

    /// DDL execution failed for a specific action batch
    #[error("DDL execution failed in {batch}: {message}")]
    Ddl { batch: String, message: String },

    /// An upgrade handler callback failed, aborting the run
    #[error("Upgrade handler '{handler}' failed: {message}")]
    Hook { handler: String, message: String },

    /// Metadata record set could not be read or written
    #[error("Upgrade metadata error: {0}")]
    Metadata(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upgrade was cancelled before the ambient transaction committed
    #[error("Upgrade cancelled")]
    Cancelled,
}

impl UpgradeError {
    /// Create a Synchronization error from a comparison result.
    pub fn synchronization(result: SchemaComparisonResult) -> Self {
        UpgradeError::Synchronization(Box::new(result))
    }

    /// Create a Ddl error with the failed batch named.
    pub fn ddl(batch: impl Into<String>, message: impl Into<String>) -> Self {
        UpgradeError::Ddl {
            batch: batch.into(),
            message: message.into(),
        }
    }

    /// Create a Hook error identifying the originating handler.
    pub fn hook(handler: impl Into<String>, message: impl Into<String>) -> Self {
        UpgradeError::Hook {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including the error chain.
    ///
    /// Synchronization errors append the complete comparison diagnostic block
    /// instead of the one-line summary.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        if let UpgradeError::Synchronization(result) = self {
            output.push('\n');
            output.push_str(&result.to_string());
        }

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

/// Result type alias for upgrade operations.
pub type Result<T> = std::result::Result<T, UpgradeError>;
