//! Transform configuration.

use nalgebra::DVector;
use rigtk_core::TransformFamily;
use serde::{Deserialize, Serialize};
use crate::error::{RegistrationError, Result};
use crate::validation::{validate_parameter_vector, validate_scales};

/// How the engine seeds the transform before optimizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Initializer {
    /// Identity (or the explicit initial parameters) about the user center.
    #[default]
    Off,
    /// Center on the fixed image's bounding box, translate box center to box center.
    GeometryCenter,
    /// Center on the fixed intensity centroid, translate centroid to centroid.
    Moments,
}

/// Which transform family to search over and how to start it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformParameters {
    pub family: TransformFamily,
    /// Per-parameter optimizer scales; `None` means all ones.
    pub scales: Option<Vec<f64>>,
    pub transform_initializer_on: bool,
    pub moments_on: bool,
    /// Center of rotation used when the initializer is off (x, y, z).
    pub center: [f64; 3],
    pub initial_parameters: Option<Vec<f64>>,
}

impl Default for TransformParameters {
    fn default() -> Self {
        Self::new(TransformFamily::Rigid2D)
    }
}

impl TransformParameters {
    pub fn new(family: TransformFamily) -> Self {
        Self {
            family,
            scales: None,
            transform_initializer_on: true,
            moments_on: false,
            center: [0.0; 3],
            initial_parameters: None,
        }
    }

    pub fn with_scales(mut self, scales: Vec<f64>) -> Self {
        self.scales = Some(scales);
        self
    }

    pub fn with_transform_initializer(mut self, on: bool) -> Self {
        self.transform_initializer_on = on;
        self
    }

    pub fn with_moments(mut self, on: bool) -> Self {
        self.moments_on = on;
        self
    }

    pub fn with_center(mut self, center: [f64; 3]) -> Self {
        self.center = center;
        self
    }

    pub fn with_initial_parameters(mut self, parameters: Vec<f64>) -> Self {
        self.initial_parameters = Some(parameters);
        self
    }

    pub fn initializer(&self) -> Initializer {
        match (self.transform_initializer_on, self.moments_on) {
            (false, _) => Initializer::Off,
            (true, false) => Initializer::GeometryCenter,
            (true, true) => Initializer::Moments,
        }
    }

    /// Parameter count of the family at `dimension`.
    pub fn parameter_count(&self, dimension: usize) -> Result<usize> {
        self.family.require_parameter_count(dimension).map_err(|_| {
            RegistrationError::dimension_mismatch(format!(
                "transform {} is not defined for {dimension}D images",
                self.family
            ))
        })
    }

    /// Check dimensionality, scales and initial parameters.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        let n = self.parameter_count(dimension)?;
        if let Some(scales) = &self.scales {
            validate_scales(scales, n)?;
        }
        if let Some(initial) = &self.initial_parameters {
            validate_parameter_vector("initial parameters", initial, n)?;
        }
        if self.center.iter().any(|c| !c.is_finite()) {
            return Err(RegistrationError::invalid_configuration(format!(
                "center {:?} is not finite",
                self.center
            )));
        }
        Ok(())
    }

    /// Optimizer scales, defaulting to ones.
    pub fn resolved_scales(&self, dimension: usize) -> Result<DVector<f64>> {
        let n = self.parameter_count(dimension)?;
        match &self.scales {
            Some(scales) => {
                validate_scales(scales, n)?;
                Ok(DVector::from_column_slice(scales))
            }
            None => Ok(DVector::from_element(n, 1.0)),
        }
    }

    pub fn identity_parameters(&self, dimension: usize) -> Result<Vec<f64>> {
        let n = self.parameter_count(dimension)?;
        Ok(self.family.identity_parameters(dimension).unwrap_or_else(|| vec![0.0; n]))
    }

    /// The user center truncated to `dimension` components.
    pub fn user_center(&self, dimension: usize) -> Vec<f64> {
        self.center[..dimension.min(3)].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initializer_selection() {
        let params = TransformParameters::new(TransformFamily::Euler3D);
        assert_eq!(params.initializer(), Initializer::GeometryCenter);
        assert_eq!(params.clone().with_moments(true).initializer(), Initializer::Moments);
        assert_eq!(
            params.with_transform_initializer(false).with_moments(true).initializer(),
            Initializer::Off
        );
    }

    #[test]
    fn test_wrong_dimension_is_a_dimension_mismatch() {
        let params = TransformParameters::new(TransformFamily::Euler3D);
        assert!(matches!(params.validate(2), Err(RegistrationError::DimensionMismatch(_))));
        assert!(params.validate(3).is_ok());
    }

    #[test]
    fn test_scales_length_is_validated() {
        let params = TransformParameters::new(TransformFamily::Rigid2D).with_scales(vec![1.0, 1.0]);
        assert!(matches!(params.validate(2), Err(RegistrationError::InvalidConfiguration(_))));
        let params = params.with_scales(vec![1.0, 1e-3, 1e-3]);
        assert!(params.validate(2).is_ok());
        assert_eq!(params.resolved_scales(2).unwrap().as_slice(), &[1.0, 1e-3, 1e-3]);
    }

    #[test]
    fn test_initial_parameters_length_is_validated() {
        let params = TransformParameters::new(TransformFamily::Translation).with_initial_parameters(vec![1.0]);
        assert!(params.validate(2).is_err());
        assert!(params.validate(3).is_err());
        let params = params.with_initial_parameters(vec![1.0, 2.0]);
        assert!(params.validate(2).is_ok());
    }

    #[test]
    fn test_default_scales_are_ones() {
        let scales = TransformParameters::new(TransformFamily::Similarity3D).resolved_scales(3).unwrap();
        assert_eq!(scales.len(), 7);
        assert!(scales.iter().all(|s| *s == 1.0));
    }

    #[test]
    fn test_identity_parameters() {
        let params = TransformParameters::new(TransformFamily::Similarity2D);
        assert_eq!(params.identity_parameters(2).unwrap(), vec![1.0, 0.0, 0.0, 0.0]);
    }
}
