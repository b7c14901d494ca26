//! Mattes mutual information.
//!
//! The joint PDF uses a zero-order window on the fixed intensity and a cubic
//! B-spline Parzen window on the moving intensity, with two padding bins on
//! each side of both axes. The value is `-MI`, so lower is better.

use rayon::prelude::*;
use crate::error::{RegistrationError, Result};
use super::trait_::{IntensityStats, Metric, MetricSamples};

const PADDING: usize = 2;
const PARALLEL_CHUNK: usize = 2048;

/// Cubic B-spline kernel.
pub fn cubic_bspline(u: f64) -> f64 {
    let a = u.abs();
    if a < 1.0 {
        (4.0 - 6.0 * a * a + 3.0 * a * a * a) / 6.0
    } else if a < 2.0 {
        let t = 2.0 - a;
        t * t * t / 6.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy)]
struct ParzenAxis {
    bin_size: f64,
    normalized_min: f64,
    bins: usize,
}

impl ParzenAxis {
    fn new(bins: usize, stats: &IntensityStats) -> Self {
        let bin_size = (stats.range() / (bins - 2 * PADDING) as f64).max(f64::EPSILON);
        Self {
            bin_size,
            normalized_min: stats.min / bin_size - PADDING as f64,
            bins,
        }
    }

    fn term(&self, value: f64) -> f64 {
        value / self.bin_size - self.normalized_min
    }

    /// Bin of `term`, clamped to `[lo, bins - 1 - hi]`.
    fn index(&self, term: f64, lo: usize, hi: usize) -> usize {
        let raw = term.floor();
        let max = (self.bins - 1 - hi) as f64;
        raw.clamp(lo as f64, max) as usize
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MattesMutualInformation {
    bins: usize,
}

impl MattesMutualInformation {
    pub fn new(bins: usize) -> Result<Self> {
        if bins <= 2 * PADDING {
            return Err(RegistrationError::invalid_configuration(format!(
                "Mattes mutual information needs more than {} bins, got {bins}",
                2 * PADDING
            )));
        }
        Ok(Self { bins })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    fn joint_pdf(&self, samples: &MetricSamples) -> Vec<f64> {
        let b = self.bins;
        let fixed_axis = ParzenAxis::new(b, &samples.fixed_stats);
        let moving_axis = ParzenAxis::new(b, &samples.moving_stats);
        let pairs: Vec<(f64, f64)> = samples.pairs().collect();

        pairs
            .par_chunks(PARALLEL_CHUNK)
            .map(|chunk| {
                let mut joint = vec![0.0; b * b];
                for &(f, m) in chunk {
                    let fi = fixed_axis.index(fixed_axis.term(f), PADDING, PADDING);
                    let moving_term = moving_axis.term(m);
                    let mi = moving_axis.index(moving_term, 1, 2);
                    for k in mi - 1..=mi + 2 {
                        joint[fi * b + k] += cubic_bspline(k as f64 - moving_term);
                    }
                }
                joint
            })
            .reduce(
                || vec![0.0; b * b],
                |mut acc, part| {
                    acc.iter_mut().zip(&part).for_each(|(a, p)| *a += p);
                    acc
                },
            )
    }
}

impl Metric for MattesMutualInformation {
    fn name(&self) -> &'static str {
        "MattesMutualInformation"
    }

    fn evaluate(&self, samples: &MetricSamples) -> Result<f64> {
        samples.require_valid()?;
        let b = self.bins;
        let mut joint = self.joint_pdf(samples);
        let total: f64 = joint.iter().sum();
        if total <= 0.0 {
            return Err(RegistrationError::metric("Mattes joint PDF is empty"));
        }
        joint.iter_mut().for_each(|p| *p /= total);

        let fixed_pdf: Vec<f64> = joint.chunks(b).map(|row| row.iter().sum()).collect();
        let mut moving_pdf = vec![0.0; b];
        for row in joint.chunks(b) {
            moving_pdf.iter_mut().zip(row).for_each(|(m, p)| *m += p);
        }

        let mut mi = 0.0;
        for i in 0..b {
            if fixed_pdf[i] <= 0.0 {
                continue;
            }
            for j in 0..b {
                let p = joint[i * b + j];
                if p > 0.0 && moving_pdf[j] > 0.0 {
                    mi += p * (p / (fixed_pdf[i] * moving_pdf[j])).ln();
                }
            }
        }
        Ok(-mi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(n: usize, f: impl Fn(usize) -> f64) -> Vec<f64> {
        (0..n).map(f).collect()
    }

    #[test]
    fn test_bspline_partition_of_unity() {
        for t in [0.0, 0.25, 0.5, 0.9] {
            let sum: f64 = (-2..=2).map(|k| cubic_bspline(k as f64 - t)).sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_dependent_beats_independent() {
        let metric = MattesMutualInformation::new(20).unwrap();
        let fixed = values(2000, |i| ((i * 37) % 101) as f64);
        let dependent = MetricSamples::from_pairs(fixed.clone(), fixed.iter().map(|v| 2.0 * v + 5.0).collect());
        let independent = MetricSamples::from_pairs(fixed, values(2000, |i| ((i * 13) % 7) as f64 * 10.0));
        let d = metric.evaluate(&dependent).unwrap();
        let i = metric.evaluate(&independent).unwrap();
        assert!(d < i, "dependent {d} should be below independent {i}");
        assert!(d < 0.0);
    }

    #[test]
    fn test_needs_enough_bins() {
        assert!(MattesMutualInformation::new(4).is_err());
        assert!(MattesMutualInformation::new(5).is_ok());
    }
}
