//! Gradient difference metric.
//!
//! Central-difference gradients of the fixed and moving samples are compared
//! along every axis of the sampling grid:
//! `Σ_d Σ_p var_d / (var_d + (∂_d F(p) - ∂_d M(p))²)`, where `var_d` is the
//! variance of the fixed gradient along axis `d`. Higher is better.

use crate::error::{RegistrationError, Result};
use super::trait_::{Metric, MetricSamples};

#[derive(Debug, Clone, Copy, Default)]
pub struct GradientDifferenceMetric;

/// Fixed and moving central differences along `axis` at interior valid points.
fn axis_gradients(samples: &MetricSamples, grid: &[usize], axis: usize) -> (Vec<f64>, Vec<f64>) {
    let stride: usize = grid[..axis].iter().product();
    let extent = grid[axis];
    let mut fixed = Vec::new();
    let mut moving = Vec::new();
    if extent < 3 {
        return (fixed, moving);
    }
    for p in 0..samples.len() {
        let coordinate = (p / stride) % extent;
        if coordinate == 0 || coordinate + 1 >= extent {
            continue;
        }
        let (prev, next) = (p - stride, p + stride);
        if !(samples.valid[p] && samples.valid[prev] && samples.valid[next]) {
            continue;
        }
        fixed.push(0.5 * (samples.fixed[next] - samples.fixed[prev]));
        moving.push(0.5 * (samples.moving[next] - samples.moving[prev]));
    }
    (fixed, moving)
}

fn variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

impl Metric for GradientDifferenceMetric {
    fn name(&self) -> &'static str {
        "GradientDifference"
    }

    fn requires_dense_grid(&self) -> bool {
        true
    }

    fn evaluate(&self, samples: &MetricSamples) -> Result<f64> {
        samples.require_valid()?;
        let grid = samples.grid.as_deref().ok_or_else(|| {
            RegistrationError::metric("gradient difference needs samples on the full fixed grid")
        })?;
        if grid.iter().product::<usize>() != samples.len() {
            return Err(RegistrationError::metric(format!(
                "grid {grid:?} does not match {} samples",
                samples.len()
            )));
        }

        let mut measure = 0.0;
        for axis in 0..grid.len() {
            let (fixed, moving) = axis_gradients(samples, grid, axis);
            if fixed.is_empty() {
                continue;
            }
            let var = variance(&fixed);
            if var <= f64::EPSILON {
                continue;
            }
            measure += fixed
                .iter()
                .zip(&moving)
                .map(|(gf, gm)| var / (var + (gf - gm).powi(2)))
                .sum::<f64>();
        }
        Ok(measure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(nx: usize, ny: usize, shift: f64) -> Vec<f64> {
        (0..nx * ny)
            .map(|p| {
                let (x, y) = ((p % nx) as f64, (p / nx) as f64);
                ((x + shift) * 0.3).sin() + (y * 0.2).cos()
            })
            .collect()
    }

    #[test]
    fn test_aligned_beats_shifted() {
        let fixed = ramp(12, 10, 0.0);
        let aligned = MetricSamples::from_pairs(fixed.clone(), fixed.clone()).with_grid(vec![12, 10]);
        let shifted = MetricSamples::from_pairs(fixed, ramp(12, 10, 2.0)).with_grid(vec![12, 10]);
        let a = GradientDifferenceMetric.evaluate(&aligned).unwrap();
        let s = GradientDifferenceMetric.evaluate(&shifted).unwrap();
        // Perfect alignment scores one per interior gradient sample.
        assert!((a - (10.0 * 10.0 + 12.0 * 8.0)).abs() < 1e-9);
        assert!(s < a);
    }

    #[test]
    fn test_requires_grid() {
        let samples = MetricSamples::from_pairs(vec![1.0, 2.0], vec![1.0, 2.0]);
        assert!(GradientDifferenceMetric.evaluate(&samples).is_err());
    }
}
