//! Joint-histogram metrics.
//!
//! Intensity pairs are binned into a `bins × bins` joint histogram whose
//! ranges come from the whole-image statistics, so the bin layout does not
//! move while the transform changes. The bins are filled in parallel with
//! rayon and merged.

use rayon::prelude::*;
use crate::error::{RegistrationError, Result};
use super::trait_::{IntensityStats, Metric, MetricSamples};

/// Widening of the upper histogram bound so the maximum falls inside the last bin.
const UPPER_BOUND_INCREASE: f64 = 1e-3;
const KL_EPSILON: f64 = 1e-12;
const PARALLEL_CHUNK: usize = 4096;

/// Uniform binning of one intensity axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinAxis {
    pub bins: usize,
    pub lower: f64,
    pub width: f64,
}

impl BinAxis {
    pub fn from_stats(bins: usize, stats: &IntensityStats) -> Self {
        let range = stats.range().max(f64::EPSILON);
        let upper = stats.max + range * UPPER_BOUND_INCREASE;
        Self {
            bins,
            lower: stats.min,
            width: (upper - stats.min).max(f64::EPSILON) / bins as f64,
        }
    }

    pub fn index(&self, value: f64) -> usize {
        let raw = ((value - self.lower) / self.width).floor();
        if raw <= 0.0 || !raw.is_finite() {
            0
        } else {
            (raw as usize).min(self.bins - 1)
        }
    }

    pub fn center(&self, bin: usize) -> f64 {
        self.lower + (bin as f64 + 0.5) * self.width
    }
}

/// Joint frequency table of fixed (rows) against moving (columns) intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct JointHistogram {
    pub fixed_axis: BinAxis,
    pub moving_axis: BinAxis,
    counts: Vec<f64>,
    total: f64,
}

impl JointHistogram {
    pub fn new(fixed_axis: BinAxis, moving_axis: BinAxis) -> Self {
        Self {
            counts: vec![0.0; fixed_axis.bins * moving_axis.bins],
            fixed_axis,
            moving_axis,
            total: 0.0,
        }
    }

    /// Histogram of the valid pairs, with ranges from the sample statistics.
    pub fn from_samples(bins: usize, samples: &MetricSamples) -> Self {
        let fixed_axis = BinAxis::from_stats(bins, &samples.fixed_stats);
        let moving_axis = BinAxis::from_stats(bins, &samples.moving_stats);
        let pairs: Vec<(f64, f64)> = samples.pairs().collect();
        Self::from_pairs(fixed_axis, moving_axis, &pairs)
    }

    pub fn from_pairs(fixed_axis: BinAxis, moving_axis: BinAxis, pairs: &[(f64, f64)]) -> Self {
        pairs
            .par_chunks(PARALLEL_CHUNK)
            .map(|chunk| {
                let mut partial = Self::new(fixed_axis, moving_axis);
                for &(f, m) in chunk {
                    partial.add(f, m);
                }
                partial
            })
            .reduce(|| Self::new(fixed_axis, moving_axis), Self::merge)
    }

    pub fn add(&mut self, fixed: f64, moving: f64) {
        let i = self.fixed_axis.index(fixed);
        let j = self.moving_axis.index(moving);
        self.counts[i * self.moving_axis.bins + j] += 1.0;
        self.total += 1.0;
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self.total += other.total;
        self
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn count(&self, i: usize, j: usize) -> f64 {
        self.counts[i * self.moving_axis.bins + j]
    }

    /// Non-empty cells as `(fixed bin, moving bin, count)`.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let cols = self.moving_axis.bins;
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0.0)
            .map(move |(k, &c)| (k / cols, k % cols, c))
    }

    pub fn fixed_marginal(&self) -> Vec<f64> {
        let cols = self.moving_axis.bins;
        self.counts.chunks(cols).map(|row| row.iter().sum()).collect()
    }

    pub fn moving_marginal(&self) -> Vec<f64> {
        let cols = self.moving_axis.bins;
        let mut marginal = vec![0.0; cols];
        for row in self.counts.chunks(cols) {
            for (m, c) in marginal.iter_mut().zip(row) {
                *m += c;
            }
        }
        marginal
    }

    pub fn fixed_entropy(&self) -> f64 {
        entropy(&self.fixed_marginal(), self.total)
    }

    pub fn moving_entropy(&self) -> f64 {
        entropy(&self.moving_marginal(), self.total)
    }

    pub fn joint_entropy(&self) -> f64 {
        entropy(&self.counts, self.total)
    }
}

fn entropy(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    -counts
        .iter()
        .filter(|&&c| c > 0.0)
        .map(|&c| {
            let p = c / total;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Which quantity is read off the joint histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramMeasure {
    /// Mean squared difference of bin centers; lower is better.
    MeanSquares,
    /// `-|r|` of the bin-center correlation; lower is better.
    CorrelationCoefficient,
    /// `H(F) + H(M) - H(F, M)`; higher is better.
    MutualInformation,
    /// `(H(F) + H(M)) / H(F, M)`; higher is better.
    NormalizedMutualInformation,
    /// Divergence from the histogram of the fixed image against itself; lower is better.
    KullbackLeibler,
}

#[derive(Debug, Clone, Copy)]
pub struct HistogramMetric {
    measure: HistogramMeasure,
    bins: usize,
}

impl HistogramMetric {
    pub fn new(measure: HistogramMeasure, bins: usize) -> Result<Self> {
        if bins < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "histogram metrics need at least 2 bins, got {bins}"
            )));
        }
        Ok(Self { measure, bins })
    }

    pub fn measure(&self) -> HistogramMeasure {
        self.measure
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    fn mean_squares(histogram: &JointHistogram) -> f64 {
        let sum: f64 = histogram
            .cells()
            .map(|(i, j, c)| c * (histogram.fixed_axis.center(i) - histogram.moving_axis.center(j)).powi(2))
            .sum();
        sum / histogram.total()
    }

    fn correlation(histogram: &JointHistogram) -> f64 {
        let total = histogram.total();
        let (mut mf, mut mm) = (0.0, 0.0);
        for (i, j, c) in histogram.cells() {
            mf += c * histogram.fixed_axis.center(i);
            mm += c * histogram.moving_axis.center(j);
        }
        mf /= total;
        mm /= total;
        let (mut vf, mut vm, mut cov) = (0.0, 0.0, 0.0);
        for (i, j, c) in histogram.cells() {
            let df = histogram.fixed_axis.center(i) - mf;
            let dm = histogram.moving_axis.center(j) - mm;
            vf += c * df * df;
            vm += c * dm * dm;
            cov += c * df * dm;
        }
        let denominator = (vf * vm).sqrt();
        if denominator <= f64::EPSILON {
            return 0.0;
        }
        -(cov / denominator).abs()
    }

    fn kullback_leibler(&self, samples: &MetricSamples, measured: &JointHistogram) -> f64 {
        let training_pairs: Vec<(f64, f64)> = samples.pairs().map(|(f, _)| (f, f)).collect();
        let training = JointHistogram::from_pairs(measured.fixed_axis, measured.moving_axis, &training_pairs);
        let cells = self.bins * self.bins;
        let training_total = training.total() + KL_EPSILON * cells as f64;
        let measured_total = measured.total() + KL_EPSILON * cells as f64;
        let mut divergence = 0.0;
        for i in 0..self.bins {
            for j in 0..self.bins {
                let t = (training.count(i, j) + KL_EPSILON) / training_total;
                let m = (measured.count(i, j) + KL_EPSILON) / measured_total;
                divergence += t * (t / m).ln();
            }
        }
        divergence
    }
}

impl Metric for HistogramMetric {
    fn name(&self) -> &'static str {
        match self.measure {
            HistogramMeasure::MeanSquares => "MeanSquaresHistogram",
            HistogramMeasure::CorrelationCoefficient => "CorrelationCoefficientHistogram",
            HistogramMeasure::MutualInformation => "MutualInformationHistogram",
            HistogramMeasure::NormalizedMutualInformation => "NormalizedMutualInformationHistogram",
            HistogramMeasure::KullbackLeibler => "KullbackLeiblerCompareHistogram",
        }
    }

    fn evaluate(&self, samples: &MetricSamples) -> Result<f64> {
        samples.require_valid()?;
        let histogram = JointHistogram::from_samples(self.bins, samples);
        Ok(match self.measure {
            HistogramMeasure::MeanSquares => Self::mean_squares(&histogram),
            HistogramMeasure::CorrelationCoefficient => Self::correlation(&histogram),
            HistogramMeasure::MutualInformation => {
                histogram.fixed_entropy() + histogram.moving_entropy() - histogram.joint_entropy()
            }
            HistogramMeasure::NormalizedMutualInformation => {
                let joint = histogram.joint_entropy();
                if joint <= f64::EPSILON {
                    return Ok(2.0);
                }
                (histogram.fixed_entropy() + histogram.moving_entropy()) / joint
            }
            HistogramMeasure::KullbackLeibler => self.kullback_leibler(samples, &histogram),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i % 17) as f64 * 3.0).collect()
    }

    fn scrambled(n: usize) -> Vec<f64> {
        (0..n).map(|i| ((i * 7 + 3) % 17) as f64 * 3.0).collect()
    }

    #[test]
    fn test_bin_axis_covers_range() {
        let axis = BinAxis::from_stats(10, &IntensityStats::from_values(&[0.0, 10.0]));
        assert_eq!(axis.index(0.0), 0);
        assert_eq!(axis.index(10.0), 9);
        assert_eq!(axis.index(-5.0), 0);
        assert_eq!(axis.index(50.0), 9);
    }

    #[test]
    fn test_histogram_totals_and_marginals() {
        let samples = MetricSamples::from_pairs(ramp(340), scrambled(340));
        let histogram = JointHistogram::from_samples(17, &samples);
        assert_eq!(histogram.total(), 340.0);
        assert_eq!(histogram.fixed_marginal().iter().sum::<f64>(), 340.0);
        assert_eq!(histogram.moving_marginal().len(), 17);
    }

    #[test]
    fn test_mutual_information_prefers_identity() {
        let metric = HistogramMetric::new(HistogramMeasure::MutualInformation, 17).unwrap();
        let same = MetricSamples::from_pairs(ramp(340), ramp(340));
        let constant = MetricSamples::from_pairs(ramp(340), vec![1.0; 340]);
        let mi_same = metric.evaluate(&same).unwrap();
        let mi_constant = metric.evaluate(&constant).unwrap();
        assert!((mi_same - 17f64.ln()).abs() < 1e-9);
        assert!(mi_constant.abs() < 1e-12);
    }

    #[test]
    fn test_normalized_mutual_information_identity_is_two() {
        let metric = HistogramMetric::new(HistogramMeasure::NormalizedMutualInformation, 17).unwrap();
        let same = MetricSamples::from_pairs(ramp(340), ramp(340));
        assert!((metric.evaluate(&same).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_coefficient() {
        let metric = HistogramMetric::new(HistogramMeasure::CorrelationCoefficient, 17).unwrap();
        let same = MetricSamples::from_pairs(ramp(340), ramp(340));
        assert!((metric.evaluate(&same).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_kullback_leibler_is_zero_for_identity() {
        let metric = HistogramMetric::new(HistogramMeasure::KullbackLeibler, 17).unwrap();
        let same = MetricSamples::from_pairs(ramp(340), ramp(340));
        let other = MetricSamples::from_pairs(ramp(340), scrambled(340));
        let kl_same = metric.evaluate(&same).unwrap();
        assert!(kl_same.abs() < 1e-6);
        assert!(metric.evaluate(&other).unwrap() > kl_same);
    }

    #[test]
    fn test_mean_squares_histogram() {
        let metric = HistogramMetric::new(HistogramMeasure::MeanSquares, 17).unwrap();
        let same = MetricSamples::from_pairs(ramp(340), ramp(340));
        let other = MetricSamples::from_pairs(ramp(340), scrambled(340));
        assert!(metric.evaluate(&same).unwrap() < 1e-9);
        assert!(metric.evaluate(&other).unwrap() > 1.0);
        assert!(HistogramMetric::new(HistogramMeasure::MeanSquares, 1).is_err());
    }
}
