//! Histogram matching of a source image onto a reference distribution.

use burn::tensor::backend::Backend;
use crate::error::{CoreError, Result};
use crate::image::Image;

/// Maps source intensities piecewise-linearly onto the reference intensity
/// distribution through a table of matching quantiles.
///
/// With `threshold_at_mean` enabled, voxels below the mean intensity are
/// treated as background and left out of both histograms.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramMatchingFilter {
    histogram_levels: usize,
    match_points: usize,
    threshold_at_mean: bool,
}

impl Default for HistogramMatchingFilter {
    fn default() -> Self {
        Self {
            histogram_levels: 1024,
            match_points: 7,
            threshold_at_mean: true,
        }
    }
}

impl HistogramMatchingFilter {
    pub fn new(histogram_levels: usize, match_points: usize, threshold_at_mean: bool) -> Self {
        Self {
            histogram_levels,
            match_points,
            threshold_at_mean,
        }
    }

    pub fn histogram_levels(&self) -> usize {
        self.histogram_levels
    }

    pub fn match_points(&self) -> usize {
        self.match_points
    }

    /// Remap `source` so that its histogram resembles that of `reference`.
    pub fn apply<B: Backend, const D: usize>(&self, source: &Image<B, D>, reference: &Image<B, D>) -> Result<Image<B, D>> {
        if self.histogram_levels < 2 {
            return Err(CoreError::invalid_parameters("histogram matching needs at least 2 levels"));
        }
        let source_values = source.to_values()?;
        let reference_values = reference.to_values()?;

        let source_table = self.quantile_table(&source_values)?;
        let reference_table = self.quantile_table(&reference_values)?;
        tracing::debug!(?source_table, ?reference_table, "histogram match points");
        let mapped: Vec<f32> = source_values
            .iter()
            .map(|&v| map_intensity(v, &source_table, &reference_table) as f32)
            .collect();

        Image::from_values(mapped, source.shape(), source.metadata().clone(), &source.data().device())
    }

    /// Intensities at quantiles `j / (M + 1)` for `j = 0..=M+1`.
    fn quantile_table(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.is_empty() {
            return Err(CoreError::invalid_parameters("cannot match the histogram of an empty image"));
        }
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lower = if self.threshold_at_mean {
            values.iter().sum::<f64>() / values.len() as f64
        } else {
            values.iter().copied().fold(f64::INFINITY, f64::min)
        };

        let levels = self.histogram_levels;
        let width = (max - lower) / levels as f64;
        let mut histogram = vec![0.0f64; levels];
        if width > 0.0 {
            for &v in values.iter().filter(|&&v| v >= lower) {
                let bin = (((v - lower) / width) as usize).min(levels - 1);
                histogram[bin] += 1.0;
            }
        }
        let total: f64 = histogram.iter().sum();

        let m = self.match_points;
        let mut table = Vec::with_capacity(m + 2);
        table.push(lower);
        for j in 1..=m {
            let q = j as f64 / (m + 1) as f64;
            table.push(quantile(&histogram, total, lower, width, q));
        }
        table.push(max);
        Ok(table)
    }
}

fn quantile(histogram: &[f64], total: f64, lower: f64, width: f64, q: f64) -> f64 {
    if total <= 0.0 {
        return lower;
    }
    let target = q * total;
    let mut cumulative = 0.0;
    for (bin, &count) in histogram.iter().enumerate() {
        if count > 0.0 && cumulative + count >= target {
            let fraction = (target - cumulative) / count;
            return lower + (bin as f64 + fraction) * width;
        }
        cumulative += count;
    }
    lower + histogram.len() as f64 * width
}

fn map_intensity(value: f64, source: &[f64], reference: &[f64]) -> f64 {
    let last = source.len() - 1;
    let segment = |i: usize| {
        let ds = source[i + 1] - source[i];
        if ds.abs() < f64::EPSILON {
            0.0
        } else {
            (reference[i + 1] - reference[i]) / ds
        }
    };

    if value < source[0] {
        return reference[0] + (value - source[0]) * segment(0);
    }
    if value >= source[last] {
        return reference[last] + (value - source[last]) * segment(last - 1);
    }
    let i = (0..last)
        .find(|&i| value >= source[i] && value < source[i + 1])
        .unwrap_or(last - 1);
    reference[i] + (value - source[i]) * segment(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageMetadata;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_affine_intensity_change_is_undone() {
        let device = Default::default();
        let reference_values: Vec<f32> = (0..256).map(|v| v as f32).collect();
        let source_values: Vec<f32> = reference_values.iter().map(|v| 2.0 * v + 10.0).collect();
        let reference =
            Image::<TestBackend, 2>::from_values(reference_values, [16, 16], ImageMetadata::default(), &device).unwrap();
        let source =
            Image::<TestBackend, 2>::from_values(source_values, [16, 16], ImageMetadata::default(), &device).unwrap();

        let matched = HistogramMatchingFilter::new(1024, 7, false)
            .apply(&source, &reference)
            .unwrap()
            .to_values()
            .unwrap();
        for (i, v) in matched.iter().enumerate() {
            assert!((v - i as f64).abs() < 1.0, "voxel {i}: {v}");
        }
    }

    #[test]
    fn test_piecewise_map_extrapolates() {
        let source = [0.0, 10.0, 20.0];
        let reference = [0.0, 5.0, 10.0];
        assert_eq!(map_intensity(5.0, &source, &reference), 2.5);
        assert_eq!(map_intensity(30.0, &source, &reference), 15.0);
        assert_eq!(map_intensity(-10.0, &source, &reference), -5.0);
    }
}
