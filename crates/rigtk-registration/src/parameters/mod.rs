//! Registration parameter records.
//!
//! Transform, metric and optimizer configurations are sum types: every
//! family is one enum variant carrying only its own knobs. All records are
//! serde-serializable so presets can store them.

pub mod transform;
pub mod metric;
pub mod optimizer;

pub use transform::{Initializer, TransformParameters};
pub use metric::{MetricFamily, MetricParameters, SampleSelection};
pub use optimizer::{OptimizerFamily, OptimizerParameters};

use crate::error::{RegistrationError, Result};

/// Validate the three records together for a `dimension`-D registration.
///
/// Returns the transform's parameter count.
pub fn validate_configuration(
    dimension: usize,
    transform: &TransformParameters,
    metric: &MetricParameters,
    optimizer: &OptimizerParameters,
) -> Result<usize> {
    transform.validate(dimension)?;
    let parameter_count = transform.parameter_count(dimension)?;
    metric.validate()?;
    optimizer.validate(parameter_count)?;
    if !metric.compute_gradient && optimizer.is_gradient_based() {
        return Err(RegistrationError::invalid_configuration(format!(
            "{} needs metric gradients but gradient computation is disabled",
            optimizer.name()
        )));
    }
    Ok(parameter_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{AmoebaSettings, RegularStepSettings};
    use rigtk_core::TransformFamily;

    #[test]
    fn test_gradient_free_metric_with_gradient_optimizer_is_rejected() {
        let transform = TransformParameters::new(TransformFamily::Translation);
        let metric = MetricParameters::default().with_compute_gradient(false);
        let rsgd = OptimizerParameters::new(OptimizerFamily::RegularStepGradientDescent(RegularStepSettings::default()));
        assert!(matches!(
            validate_configuration(2, &transform, &metric, &rsgd),
            Err(RegistrationError::InvalidConfiguration(_))
        ));
        let amoeba = OptimizerParameters::new(OptimizerFamily::Amoeba(AmoebaSettings::default()));
        assert_eq!(validate_configuration(2, &transform, &metric, &amoeba).unwrap(), 2);
    }

    #[test]
    fn test_dimension_mismatch_surfaces_first() {
        let transform = TransformParameters::new(TransformFamily::VersorRigid3D);
        let result = validate_configuration(2, &transform, &MetricParameters::default(), &OptimizerParameters::default());
        assert!(matches!(result, Err(RegistrationError::DimensionMismatch(_))));
    }
}
