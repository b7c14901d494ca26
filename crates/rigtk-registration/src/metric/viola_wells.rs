//! Viola-Wells mutual information.
//!
//! Entropies are estimated with Gaussian Parzen windows: the samples are
//! split into two halves A and B, and for every sample in B the kernel sums
//! over A give the marginal and joint densities. The per-sample sums over B
//! run in parallel with rayon. Higher is better.

use rayon::prelude::*;
use crate::error::{RegistrationError, Result};
use super::trait_::{Metric, MetricSamples};

/// Floor of every kernel sum.
const MIN_PROBABILITY: f64 = 1e-4;

#[derive(Debug, Clone, Copy)]
pub struct ViolaWellsMutualInformation {
    fixed_standard_deviation: f64,
    moving_standard_deviation: f64,
    normalize: bool,
}

impl ViolaWellsMutualInformation {
    pub fn new(fixed_standard_deviation: f64, moving_standard_deviation: f64) -> Result<Self> {
        for (name, sd) in [("fixed", fixed_standard_deviation), ("moving", moving_standard_deviation)] {
            if !(sd > 0.0 && sd.is_finite()) {
                return Err(RegistrationError::invalid_configuration(format!(
                    "{name} kernel standard deviation must be positive, got {sd}"
                )));
            }
        }
        Ok(Self {
            fixed_standard_deviation,
            moving_standard_deviation,
            normalize: false,
        })
    }

    /// Z-score intensities with the whole-image statistics before evaluation.
    pub fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    fn normalized_pairs(&self, samples: &MetricSamples) -> Vec<(f64, f64)> {
        let z = |v: f64, mean: f64, std: f64| if std > f64::EPSILON { (v - mean) / std } else { v - mean };
        samples
            .pairs()
            .map(|(f, m)| {
                if self.normalize {
                    (
                        z(f, samples.fixed_stats.mean, samples.fixed_stats.std),
                        z(m, samples.moving_stats.mean, samples.moving_stats.std),
                    )
                } else {
                    (f, m)
                }
            })
            .collect()
    }
}

fn kernel(u: f64) -> f64 {
    (-0.5 * u * u).exp()
}

impl Metric for ViolaWellsMutualInformation {
    fn name(&self) -> &'static str {
        "MutualInformation"
    }

    fn evaluate(&self, samples: &MetricSamples) -> Result<f64> {
        samples.require_valid()?;
        let pairs = self.normalized_pairs(samples);
        let half = pairs.len() / 2;
        if half == 0 {
            return Err(RegistrationError::metric(
                "mutual information needs at least two valid samples",
            ));
        }
        let (set_a, set_b) = pairs.split_at(half);
        let set_b = &set_b[..half];
        let (sf, sm) = (self.fixed_standard_deviation, self.moving_standard_deviation);

        let (log_fixed, log_moving, log_joint) = set_b
            .par_iter()
            .map(|&(fb, mb)| {
                let (mut sum_fixed, mut sum_moving, mut sum_joint) = (MIN_PROBABILITY, MIN_PROBABILITY, MIN_PROBABILITY);
                for &(fa, ma) in set_a {
                    let kf = kernel((fb - fa) / sf);
                    let km = kernel((mb - ma) / sm);
                    sum_fixed += kf;
                    sum_moving += km;
                    sum_joint += kf * km;
                }
                (-sum_fixed.ln(), -sum_moving.ln(), -sum_joint.ln())
            })
            .reduce(|| (0.0, 0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));

        let n = half as f64;
        Ok((log_fixed + log_moving - log_joint) / n + n.ln())
    }
}
