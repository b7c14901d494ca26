//! Registration failures.
//!
//! A cooperative stop is never an error; it surfaces as
//! [`StopCondition::UserRequested`](crate::StopCondition::UserRequested) on a
//! successful result.

use rigtk_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationError {
    /// The metric could not produce a value, e.g. no valid samples remained.
    #[error("Metric evaluation failed: {0}")]
    Metric(String),

    /// A transform or placement could not be built or inverted.
    #[error("Transform error: {0}")]
    Transform(String),

    /// An input image carries unusable geometry or intensities.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Reading intensities back from the tensor backend failed.
    #[error("Sampling failed: {0}")]
    Sampling(String),

    /// The metric or optimizer produced a non-finite value.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The transform family does not exist in the image dimensionality.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    /// A preset could not be found, read or written.
    #[error("Preset error: {0}")]
    Preset(String),
}

pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    pub fn metric(msg: impl Into<String>) -> Self {
        Self::Metric(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    pub fn image_validation(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    pub fn preset(msg: impl Into<String>) -> Self {
        Self::Preset(msg.into())
    }
}

impl From<CoreError> for RegistrationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SingularMatrix(msg) => Self::Transform(msg),
            CoreError::UnsupportedDimension(msg) => Self::DimensionMismatch(msg),
            CoreError::InvalidMetadata(msg) => Self::InvalidImage(msg),
            CoreError::InvalidSchedule(msg) | CoreError::InvalidParameters(msg) => Self::InvalidConfiguration(msg),
            CoreError::TensorData(msg) => Self::Sampling(msg),
        }
    }
}

impl From<serde_json::Error> for RegistrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Preset(err.to_string())
    }
}
