//! Error types for the sleuth-ml crate.

use sleuth_core::error::TrainingError;
use thiserror::Error;

/// Errors from table assembly and model fitting.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("No labeled rows to train on")]
    NoLabeledData,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MlError {
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<MlError> for TrainingError {
    fn from(err: MlError) -> Self {
        match err {
            MlError::NoLabeledData => TrainingError::NoLabeledData,
            MlError::Dataset(message) | MlError::InvalidInput(message) => {
                TrainingError::InvalidTable { message }
            }
            MlError::Model(message) => TrainingError::Model { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_training_error() {
        assert_eq!(
            TrainingError::from(MlError::NoLabeledData),
            TrainingError::NoLabeledData
        );
        assert_eq!(
            TrainingError::from(MlError::dataset("ragged row")),
            TrainingError::InvalidTable {
                message: "ragged row".into()
            }
        );
        assert_eq!(
            TrainingError::from(MlError::model("diverged")),
            TrainingError::Model {
                message: "diverged".into()
            }
        );
    }
}
