//! Error types for clickstream feature derivation

use thiserror::Error;

/// Errors that can occur while building features
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Type error in column '{column}' at row {row}: {message}")]
    Type {
        column: String,
        row: usize,
        message: String,
    },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Row {0} not present in table")]
    MissingRow(usize),

    #[error("Failed to parse input: {0}")]
    Parse(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl FeatureError {
    /// Build a schema error for a required column absent from a table
    pub fn missing_column(table: &str, column: &str) -> Self {
        FeatureError::Schema(format!("table '{}' has no column '{}'", table, column))
    }

    /// Build a type error for a value that failed to parse
    pub fn bad_value(column: &str, row: usize, message: impl Into<String>) -> Self {
        FeatureError::Type {
            column: column.to_string(),
            row,
            message: message.into(),
        }
    }
}
