//! Metric trait for image similarity measurement.
//!
//! Metrics are evaluated on intensity pairs sampled by the registration cost
//! function: fixed-image values at fixed sample points and moving-image values
//! at the mapped points. Whole-image intensity statistics travel with the
//! samples so histogram ranges stay fixed across evaluations.

use crate::error::{RegistrationError, Result};

/// Summary statistics of all voxels of one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl IntensityStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { min: 0.0, max: 0.0, mean: 0.0, std: 0.0 };
        }
        let n = values.len() as f64;
        let (min, max, sum) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY, 0.0), |(lo, hi, s), &v| (lo.min(v), hi.max(v), s + v));
        let mean = sum / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self { min, max, mean, std: variance.sqrt() }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// Intensity pairs for one metric evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSamples {
    pub fixed: Vec<f64>,
    pub moving: Vec<f64>,
    /// Whether each pair lies inside both masks and the moving buffer.
    pub valid: Vec<bool>,
    /// Grid size (x, y[, z]) when the samples cover every fixed voxel in order.
    pub grid: Option<Vec<usize>>,
    pub fixed_stats: IntensityStats,
    pub moving_stats: IntensityStats,
}

impl MetricSamples {
    /// Samples where every pair is valid, with statistics from the values themselves.
    pub fn from_pairs(fixed: Vec<f64>, moving: Vec<f64>) -> Self {
        let fixed_stats = IntensityStats::from_values(&fixed);
        let moving_stats = IntensityStats::from_values(&moving);
        let valid = vec![true; fixed.len()];
        Self { fixed, moving, valid, grid: None, fixed_stats, moving_stats }
    }

    pub fn with_grid(mut self, grid: Vec<usize>) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn with_stats(mut self, fixed_stats: IntensityStats, moving_stats: IntensityStats) -> Self {
        self.fixed_stats = fixed_stats;
        self.moving_stats = moving_stats;
        self
    }

    pub fn len(&self) -> usize {
        self.fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Valid `(fixed, moving)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.fixed
            .iter()
            .zip(&self.moving)
            .zip(&self.valid)
            .filter(|(_, valid)| **valid)
            .map(|((&f, &m), _)| (f, m))
    }

    /// Number of valid pairs, or an error when there are none.
    pub fn require_valid(&self) -> Result<usize> {
        match self.valid_count() {
            0 => Err(RegistrationError::metric(
                "too many samples map outside moving image buffer",
            )),
            n => Ok(n),
        }
    }
}

/// A similarity measure over sampled intensity pairs.
pub trait Metric: Send + Sync {
    /// Name of this metric, used in logs.
    fn name(&self) -> &'static str;

    /// Compute the metric value.
    fn evaluate(&self, samples: &MetricSamples) -> Result<f64>;

    /// Whether the samples must cover every fixed voxel on its grid.
    fn requires_dense_grid(&self) -> bool {
        false
    }
}
