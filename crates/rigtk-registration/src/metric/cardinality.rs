//! Label-overlap metrics for segmentation-like images.

use crate::error::{RegistrationError, Result};
use super::trait_::{Metric, MetricSamples};

const FOREGROUND_TOLERANCE: f64 = 0.5;

/// Fraction of pairs whose rounded intensities are equal; higher is better.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchCardinality;

impl Metric for MatchCardinality {
    fn name(&self) -> &'static str {
        "MatchCardinality"
    }

    fn evaluate(&self, samples: &MetricSamples) -> Result<f64> {
        let n = samples.require_valid()?;
        let matches = samples.pairs().filter(|(f, m)| f.round() == m.round()).count();
        Ok(matches as f64 / n as f64)
    }
}

/// Dice overlap `2|F ∩ M| / (|F| + |M|)` of the foreground label; higher is better.
#[derive(Debug, Clone, Copy)]
pub struct KappaStatistic {
    foreground_value: f64,
}

impl KappaStatistic {
    pub fn new(foreground_value: f64) -> Self {
        Self { foreground_value }
    }

    pub fn foreground_value(&self) -> f64 {
        self.foreground_value
    }

    fn is_foreground(&self, value: f64) -> bool {
        (value - self.foreground_value).abs() < FOREGROUND_TOLERANCE
    }
}

impl Metric for KappaStatistic {
    fn name(&self) -> &'static str {
        "KappaStatistic"
    }

    fn evaluate(&self, samples: &MetricSamples) -> Result<f64> {
        samples.require_valid()?;
        let (mut fixed, mut moving, mut both) = (0usize, 0usize, 0usize);
        for (f, m) in samples.pairs() {
            let (in_f, in_m) = (self.is_foreground(f), self.is_foreground(m));
            fixed += usize::from(in_f);
            moving += usize::from(in_m);
            both += usize::from(in_f && in_m);
        }
        if fixed + moving == 0 {
            return Err(RegistrationError::metric(format!(
                "no foreground voxels with value {}",
                self.foreground_value
            )));
        }
        Ok(2.0 * both as f64 / (fixed + moving) as f64)
    }
}
