//! Intensity-difference metrics.

use crate::error::{RegistrationError, Result};
use super::trait_::{Metric, MetricSamples};

/// Mean of squared intensity differences; lower is better.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaresMetric;

impl Metric for MeanSquaresMetric {
    fn name(&self) -> &'static str {
        "MeanSquares"
    }

    fn evaluate(&self, samples: &MetricSamples) -> Result<f64> {
        let n = samples.require_valid()?;
        let sum: f64 = samples.pairs().map(|(f, m)| (f - m).powi(2)).sum();
        Ok(sum / n as f64)
    }
}

/// Sum of `1 / (1 + lambda·diff²)`; higher is better.
///
/// Every pair contributes at most one, so the measure saturates for large
/// differences instead of being dominated by outliers.
#[derive(Debug, Clone, Copy)]
pub struct MeanReciprocalSquareDifference {
    lambda: f64,
}

impl MeanReciprocalSquareDifference {
    pub fn new(lambda: f64) -> Result<Self> {
        if !(lambda > 0.0 && lambda.is_finite()) {
            return Err(RegistrationError::invalid_configuration(format!(
                "MRSD lambda must be positive, got {lambda}"
            )));
        }
        Ok(Self { lambda })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Metric for MeanReciprocalSquareDifference {
    fn name(&self) -> &'static str {
        "MeanReciprocalSquareDifference"
    }

    fn evaluate(&self, samples: &MetricSamples) -> Result<f64> {
        samples.require_valid()?;
        Ok(samples
            .pairs()
            .map(|(f, m)| 1.0 / (1.0 + self.lambda * (f - m).powi(2)))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_squares() {
        let samples = MetricSamples::from_pairs(vec![1.0, 2.0, 3.0], vec![1.0, 4.0, 0.0]);
        let value = MeanSquaresMetric.evaluate(&samples).unwrap();
        assert!((value - 13.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_squares_identical_is_zero() {
        let samples = MetricSamples::from_pairs(vec![5.0; 4], vec![5.0; 4]);
        assert_eq!(MeanSquaresMetric.evaluate(&samples).unwrap(), 0.0);
    }

    #[test]
    fn test_mrsd_peaks_at_alignment() {
        let metric = MeanReciprocalSquareDifference::new(1.0).unwrap();
        let aligned = MetricSamples::from_pairs(vec![1.0, 2.0], vec![1.0, 2.0]);
        let shifted = MetricSamples::from_pairs(vec![1.0, 2.0], vec![2.0, 4.0]);
        assert_eq!(metric.evaluate(&aligned).unwrap(), 2.0);
        assert!((metric.evaluate(&shifted).unwrap() - 0.7).abs() < 1e-12);
        assert!(MeanReciprocalSquareDifference::new(0.0).is_err());
    }
}
