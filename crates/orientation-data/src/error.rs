//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while loading, cleaning or storing student data.
#[derive(Debug, Error)]
pub enum DataError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A column required by the feature schema is absent
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A key that is not part of the feature schema
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// The feature schema itself is inconsistent
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A feature value outside its accepted range
    #[error("Invalid value for {feature}: {reason}")]
    InvalidValue {
        /// Feature name
        feature: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Dataset contains no rows
    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    /// Target column has no observed value
    #[error("Target column {0} has no values")]
    EmptyTarget(String),

    /// Record not found in the store
    #[error("Student not found: {0}")]
    NotFound(i64),
}
