//! Error types for table reconciliation.

use std::path::PathBuf;

/// A logical column type the active dialect has no SQL mapping for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported column type {logical_type}: {reason}")]
pub struct UnsupportedType {
    /// Human readable form of the logical type.
    pub logical_type: String,
    /// Why the dialect rejects it.
    pub reason: &'static str,
}

/// Errors that can occur while reconciling a table.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A column's logical type cannot be expressed in the dialect.
    #[error("Table '{table}', column '{column}': {source}")]
    UnsupportedType {
        /// Table the column belongs to.
        table: String,
        /// Offending column.
        column: String,
        /// Mapping failure.
        #[source]
        source: UnsupportedType,
    },

    /// The model breaks one of its own invariants.
    #[error("Invalid model for table '{table}': {message}")]
    InvalidModel {
        /// Table name.
        table: String,
        /// What is wrong.
        message: String,
    },

    /// A catalog (introspection) query failed.
    #[error("Catalog query for table '{table}' failed: {source}\n  query: {sql}")]
    CatalogQuery {
        /// Table being introspected.
        table: String,
        /// The query text.
        sql: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The database rejected a synthesized DDL statement.
    #[error("DDL statement for table '{table}' failed: {source}\n  statement: {statement}")]
    Execution {
        /// Table being reconciled.
        table: String,
        /// The rejected statement.
        statement: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// No dialect registered under the requested name.
    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    /// Connecting to the database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading model files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a model file.
    #[error("Failed to parse model file '{path}': {source}")]
    ModelFile {
        /// Path to the model file.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconcileError {
    pub(crate) fn invalid(table: &str, message: impl Into<String>) -> Self {
        Self::InvalidModel {
            table: table.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
