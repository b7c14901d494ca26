//! Normalized cross correlation.

use crate::error::Result;
use super::trait_::{Metric, MetricSamples};

const DENOMINATOR_EPSILON: f64 = 1e-12;

/// `-Σfm / sqrt(Σf² Σm²)`; perfectly correlated images give -1.
///
/// Zero-energy samples give 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedCorrelationMetric;

impl Metric for NormalizedCorrelationMetric {
    fn name(&self) -> &'static str {
        "NormalizedCorrelation"
    }

    fn evaluate(&self, samples: &MetricSamples) -> Result<f64> {
        samples.require_valid()?;
        let (sff, smm, sfm) = samples
            .pairs()
            .fold((0.0, 0.0, 0.0), |(ff, mm, fm), (f, m)| (ff + f * f, mm + m * m, fm + f * m));
        let denominator = (sff * smm).sqrt();
        if denominator < DENOMINATOR_EPSILON {
            return Ok(0.0);
        }
        Ok(-sfm / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_copy_is_minus_one() {
        let samples = MetricSamples::from_pairs(vec![1.0, 2.0, 3.0], vec![2.0, 4.0, 6.0]);
        let value = NormalizedCorrelationMetric.evaluate(&samples).unwrap();
        assert!((value + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_energy_is_zero() {
        let samples = MetricSamples::from_pairs(vec![0.0; 3], vec![1.0, 2.0, 3.0]);
        assert_eq!(NormalizedCorrelationMetric.evaluate(&samples).unwrap(), 0.0);
    }
}
