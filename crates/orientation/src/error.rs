//! Error taxonomy of the orientation service.

use orientation_data::DataError;
use orientation_model::ModelError;
use thiserror::Error;

/// A failed training attempt. Fatal to the attempt, returned to the caller.
#[derive(Debug, Error)]
pub enum TrainError {
    /// Dataset unreadable, malformed, missing a column or without targets
    #[error("Dataset error: {0}")]
    Data(#[from] DataError),

    /// Encoding or fitting failed
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl TrainError {
    /// Short stable name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Model(_) => "model",
        }
    }
}

/// Why a single prediction could not produce a model label.
///
/// Always collapsed to the fallback sector at the service boundary.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// No fitted model is published
    #[error("No fitted model available")]
    NoArtifact,

    /// The input does not fit the feature schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The encoded row does not fit the fitted model
    #[error("Encoder miss: {0}")]
    EncoderMiss(String),

    /// Any other model failure
    #[error("Model error: {0}")]
    Model(ModelError),
}

impl PredictionError {
    /// Short stable name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoArtifact => "no_artifact",
            Self::SchemaMismatch(_) => "schema_mismatch",
            Self::EncoderMiss(_) => "encoder_miss",
            Self::Model(_) => "model",
        }
    }
}

impl From<DataError> for PredictionError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::UnknownFeature(name) => {
                Self::SchemaMismatch(format!("unknown feature {}", name))
            }
            DataError::MissingColumn(name) => {
                Self::SchemaMismatch(format!("missing column {}", name))
            }
            other => Self::Model(ModelError::Data(other)),
        }
    }
}

impl From<ModelError> for PredictionError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::SchemaMismatch(msg) => Self::SchemaMismatch(msg),
            ModelError::Data(data) => data.into(),
            ModelError::DimensionMismatch { expected, actual } => Self::EncoderMiss(format!(
                "encoded width {} does not match model width {}",
                actual, expected
            )),
            ModelError::NotFitted => Self::NoArtifact,
            other => Self::Model(other),
        }
    }
}

/// Invalid service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
    },

    /// A parameter is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Training parameters rejected by the model
    #[error(transparent)]
    Training(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ModelError::SchemaMismatch("x".into()), "schema_mismatch")]
    #[case(ModelError::DimensionMismatch { expected: 3, actual: 2 }, "encoder_miss")]
    #[case(ModelError::NotFitted, "no_artifact")]
    #[case(ModelError::EmptyTrainingSet, "model")]
    #[case(ModelError::Data(DataError::UnknownFeature("Shoe".into())), "schema_mismatch")]
    fn test_prediction_error_kind(#[case] err: ModelError, #[case] kind: &str) {
        assert_eq!(PredictionError::from(err).kind(), kind);
    }

    #[test]
    fn test_train_error_kind() {
        let err = TrainError::from(DataError::EmptyDataset("no rows".into()));
        assert_eq!(err.kind(), "data");
        assert!(err.to_string().contains("no rows"));
        assert_eq!(TrainError::from(ModelError::NotFitted).kind(), "model");
    }
}
