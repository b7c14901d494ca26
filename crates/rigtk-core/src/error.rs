//! Error types for core image and geometry operations.

use thiserror::Error;

/// Errors raised by core image, geometry and filter operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A placement or direction matrix could not be inverted.
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    /// An operation was asked to work on an unsupported dimensionality.
    #[error("Unsupported dimension: {0}")]
    UnsupportedDimension(String),

    /// Image metadata is malformed (non-positive spacing, wrong lengths).
    #[error("Invalid image metadata: {0}")]
    InvalidMetadata(String),

    /// A multi-resolution schedule is malformed.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A parameter vector does not match its transform family.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Tensor data could not be read back from the backend.
    #[error("Tensor data error: {0}")]
    TensorData(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a singular matrix error.
    pub fn singular(msg: impl Into<String>) -> Self {
        Self::SingularMatrix(msg.into())
    }

    /// Create an unsupported dimension error.
    pub fn unsupported_dimension(msg: impl Into<String>) -> Self {
        Self::UnsupportedDimension(msg.into())
    }

    /// Create an invalid metadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create an invalid schedule error.
    pub fn invalid_schedule(msg: impl Into<String>) -> Self {
        Self::InvalidSchedule(msg.into())
    }

    /// Create an invalid parameters error.
    pub fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::singular("placement");
        assert_eq!(err.to_string(), "Singular matrix: placement");
    }

    #[test]
    fn test_schedule_error() {
        let err = CoreError::invalid_schedule("no levels");
        assert!(matches!(err, CoreError::InvalidSchedule(_)));
    }
}
