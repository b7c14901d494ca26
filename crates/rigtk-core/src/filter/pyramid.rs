use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use crate::error::{CoreError, Result};
use crate::image::Image;
use super::gaussian::GaussianFilter;
use super::downsample::DownsampleFilter;

/// Per-level shrink factors, coarsest level first.
///
/// Each row holds one factor per index axis `(x, y[, z])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidSchedule {
    factors: Vec<Vec<usize>>,
}

impl PyramidSchedule {
    pub fn new(factors: Vec<Vec<usize>>) -> Self {
        Self { factors }
    }

    /// A single full-resolution level.
    pub fn identity(dimension: usize) -> Self {
        Self::new(vec![vec![1; dimension]])
    }

    /// Power-of-two shrinking over `levels` levels, e.g. `[4, 2, 1]` for three.
    pub fn power_of_two(levels: usize, dimension: usize) -> Self {
        let factors = (0..levels)
            .map(|i| vec![1usize << (levels - 1 - i); dimension])
            .collect();
        Self::new(factors)
    }

    pub fn levels(&self) -> usize {
        self.factors.len()
    }

    pub fn level(&self, level: usize) -> Option<&[usize]> {
        self.factors.get(level).map(Vec::as_slice)
    }

    pub fn factors(&self) -> &[Vec<usize>] {
        &self.factors
    }

    /// Checks that there is at least one level, every row has `dimension`
    /// entries and every factor is at least 1.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if self.factors.is_empty() {
            return Err(CoreError::invalid_schedule("schedule has no levels"));
        }
        for (level, row) in self.factors.iter().enumerate() {
            if row.len() != dimension {
                return Err(CoreError::invalid_schedule(format!(
                    "level {level} has {} factors, expected {dimension}",
                    row.len()
                )));
            }
            if row.iter().any(|&f| f == 0) {
                return Err(CoreError::invalid_schedule(format!(
                    "level {level} has a zero shrink factor"
                )));
            }
        }
        Ok(())
    }

    /// Smoothing sigmas for a level: `0.5 * factor * spacing` where the factor exceeds 1.
    pub fn smoothing_sigmas(&self, level: usize, spacing: &[f64]) -> Vec<f64> {
        self.level(level)
            .map(|row| {
                row.iter()
                    .zip(spacing)
                    .map(|(&f, &s)| if f > 1 { 0.5 * f as f64 * s } else { 0.0 })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Multi-resolution image pyramid, coarsest level first.
#[derive(Debug, Clone)]
pub struct MultiResolutionPyramid<B: Backend, const D: usize> {
    images: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> MultiResolutionPyramid<B, D> {
    /// Smooth then downsample `input` once per schedule level.
    pub fn new(input: &Image<B, D>, schedule: &PyramidSchedule) -> Result<Self> {
        schedule.validate(D)?;
        let spacing = input.spacing().to_vec();

        let mut images = Vec::with_capacity(schedule.levels());
        for (level, factors) in schedule.factors().iter().enumerate() {
            if factors.iter().all(|&f| f == 1) {
                images.push(input.clone());
                continue;
            }
            let sigmas = schedule.smoothing_sigmas(level, &spacing);
            tracing::debug!(level, ?factors, ?sigmas, "building pyramid level");
            let smoothed = GaussianFilter::new(sigmas).apply(input);
            images.push(DownsampleFilter::new(factors.clone()).apply(&smoothed)?);
        }

        Ok(Self { images })
    }

    pub fn get_level(&self, level: usize) -> Option<&Image<B, D>> {
        self.images.get(level)
    }

    pub fn levels(&self) -> usize {
        self.images.len()
    }

    pub fn into_levels(self) -> Vec<Image<B, D>> {
        self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageMetadata;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_schedule_validation() {
        assert!(PyramidSchedule::new(vec![]).validate(2).is_err());
        assert!(PyramidSchedule::new(vec![vec![2, 2, 2]]).validate(2).is_err());
        assert!(PyramidSchedule::new(vec![vec![0, 1]]).validate(2).is_err());
        assert!(PyramidSchedule::new(vec![vec![4, 4], vec![1, 1]]).validate(2).is_ok());
    }

    #[test]
    fn test_power_of_two_schedule() {
        let schedule = PyramidSchedule::power_of_two(3, 2);
        assert_eq!(schedule.factors(), &[vec![4, 4], vec![2, 2], vec![1, 1]]);
        assert_eq!(schedule.smoothing_sigmas(0, &[1.0, 2.0]), vec![2.0, 4.0]);
        assert_eq!(schedule.smoothing_sigmas(2, &[1.0, 2.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_pyramid_levels() {
        let device = Default::default();
        let image = Image::<TestBackend, 2>::from_metadata(Tensor::ones([16, 16], &device), ImageMetadata::default());
        let pyramid = MultiResolutionPyramid::new(&image, &PyramidSchedule::power_of_two(2, 2)).unwrap();
        assert_eq!(pyramid.levels(), 2);
        assert_eq!(pyramid.get_level(0).unwrap().size(), [8, 8]);
        assert_eq!(pyramid.get_level(0).unwrap().spacing()[0], 2.0);
        assert_eq!(pyramid.get_level(1).unwrap().size(), [16, 16]);
    }
}
