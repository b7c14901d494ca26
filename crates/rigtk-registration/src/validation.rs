//! Validation utilities for registration inputs.
//!
//! Parameter records and engines call these before any pixel work so that
//! malformed configurations fail with `InvalidConfiguration` instead of a
//! numeric error deep inside an optimizer.

use burn::tensor::backend::Backend;
use rigtk_core::image::Image;
use crate::error::{RegistrationError, Result};

/// Upper bound on any iteration budget.
pub const MAX_ITERATIONS: usize = 1_000_000;

/// Validate that two images have the same tensor shape.
pub fn validate_image_shapes<B: Backend, const D: usize>(
    expected: &Image<B, D>,
    actual: &Image<B, D>,
) -> Result<()> {
    let expected_shape = expected.shape();
    let actual_shape = actual.shape();

    if expected_shape != actual_shape {
        return Err(RegistrationError::ShapeMismatch {
            expected: expected_shape.to_vec(),
            actual: actual_shape.to_vec(),
        });
    }

    Ok(())
}

/// Validate that an image has at least one voxel along every axis.
///
/// A sheared direction matrix is accepted with a warning: rigid families
/// then act on a frame whose axes are not perpendicular.
pub fn validate_non_empty<B: Backend, const D: usize>(image: &Image<B, D>, role: &str) -> Result<()> {
    if image.num_voxels() == 0 {
        return Err(RegistrationError::image_validation(format!(
            "{role} image has no voxels (shape {:?})",
            image.shape()
        )));
    }
    if !image.direction().is_orthogonal() {
        tracing::warn!(role, "image direction is not orthonormal");
    }
    Ok(())
}

/// Validate a strictly positive, finite knob.
pub fn validate_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "{name} must be positive and finite, got {value}"
        )));
    }
    Ok(())
}

/// Validate a knob that must lie in the open interval `(0, 1)`.
pub fn validate_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(RegistrationError::invalid_configuration(format!(
            "{name} must lie in (0, 1), got {value}"
        )));
    }
    Ok(())
}

/// Validate an integer knob against an inclusive range.
fn validate_count(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(RegistrationError::invalid_configuration(format!(
            "{name} must lie in [{min}, {max}], got {value}"
        )));
    }
    Ok(())
}

pub fn validate_iterations(iterations: usize) -> Result<()> {
    validate_count("number of iterations", iterations, 1, MAX_ITERATIONS)
}

pub fn validate_histogram_bins(bins: usize) -> Result<()> {
    validate_count("number of histogram bins", bins, 2, 1024)
}

/// Correction pairs kept by the limited-memory quasi-Newton families.
pub fn validate_lbfgs_memory(memory: usize) -> Result<()> {
    validate_count("L-BFGS memory", memory, 1, 100)
}

/// Validate a per-parameter vector against the expected parameter count.
pub fn validate_parameter_vector(name: &str, values: &[f64], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(RegistrationError::invalid_configuration(format!(
            "{name} has {} entries, the transform has {expected} parameters",
            values.len()
        )));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(RegistrationError::invalid_configuration(format!(
            "{name} contains a non-finite entry ({bad})"
        )));
    }
    Ok(())
}

/// Validate optimizer scales: correct length, finite and strictly positive.
pub fn validate_scales(scales: &[f64], expected: usize) -> Result<()> {
    validate_parameter_vector("scales", scales, expected)?;
    if let Some(bad) = scales.iter().find(|s| **s <= 0.0) {
        return Err(RegistrationError::invalid_configuration(format!(
            "scales must be strictly positive, got {bad}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use rigtk_core::{Direction, ImageMetadata, Point, Spacing};

    type B = NdArray<f32>;

    fn image(shape: [usize; 2]) -> Image<B, 2> {
        let device = Default::default();
        Image::from_metadata(Tensor::<B, 2>::zeros(shape, &device), ImageMetadata::default())
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("step", 0.01).is_ok());
        assert!(validate_positive("step", 0.0).is_err());
        assert!(validate_positive("step", -1.0).is_err());
        assert!(validate_positive("step", f64::NAN).is_err());
        assert!(validate_positive("step", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_unit_interval() {
        assert!(validate_unit_interval("relaxation", 0.5).is_ok());
        assert!(validate_unit_interval("relaxation", 1.0).is_err());
        assert!(validate_unit_interval("relaxation", 0.0).is_err());
    }

    #[test]
    fn test_validate_iterations() {
        assert!(validate_iterations(100).is_ok());
        assert!(validate_iterations(0).is_err());
        assert!(validate_iterations(2_000_000).is_err());
    }

    #[test]
    fn test_validate_histogram_bins() {
        assert!(validate_histogram_bins(32).is_ok());
        assert!(validate_histogram_bins(1).is_err());
        assert!(validate_histogram_bins(2000).is_err());
    }

    #[test]
    fn test_validate_lbfgs_memory() {
        assert!(validate_lbfgs_memory(5).is_ok());
        assert!(validate_lbfgs_memory(0).is_err());
        assert!(validate_lbfgs_memory(200).is_err());
    }

    #[test]
    fn test_validate_scales() {
        assert!(validate_scales(&[1.0, 1.0], 2).is_ok());
        assert!(validate_scales(&[1.0], 2).is_err());
        assert!(validate_scales(&[1.0, 0.0], 2).is_err());
        assert!(validate_scales(&[1.0, f64::NAN], 2).is_err());
    }

    #[test]
    fn test_validate_non_empty() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        assert!(validate_non_empty(&image([4, 5]), "fixed").is_ok());

        let device = Default::default();
        let sheared = Direction::from_row_major([[1.0, 0.5], [0.0, 1.0]]);
        let metadata = ImageMetadata::new(Point::new([0.0, 0.0]), Spacing::uniform(1.0), sheared).unwrap();
        let image = Image::<B, 2>::from_metadata(Tensor::zeros([4, 4], &device), metadata);
        assert!(!image.direction().is_orthogonal());
        assert!(validate_non_empty(&image, "fixed").is_ok());
    }

    #[test]
    fn test_validate_image_shapes() {
        assert!(validate_image_shapes(&image([4, 5]), &image([4, 5])).is_ok());
        let err = validate_image_shapes(&image([4, 5]), &image([5, 4])).unwrap_err();
        assert!(matches!(err, RegistrationError::ShapeMismatch { .. }));
    }
}
