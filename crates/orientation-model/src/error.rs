//! Error types for model fitting and inference.

use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised by the encoder, the forest and the fitted pipeline
#[derive(Debug, Error)]
pub enum ModelError {
    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Data layer error
    #[error("Data error: {0}")]
    Data(#[from] orientation_data::DataError),

    /// Input table does not carry the columns the fitted state expects
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Invalid parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model used before fitting
    #[error("Model is not fitted")]
    NotFitted,

    /// Nothing to learn from
    #[error("Training set is empty")]
    EmptyTrainingSet,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
