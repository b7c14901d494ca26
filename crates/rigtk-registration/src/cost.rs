//! Image similarity as a function of transform parameters.
//!
//! [`ImageMetricCost`] fixes a set of fixed-image sample points once, then
//! for every parameter vector maps them through the transform, samples the
//! moving image and evaluates the metric on the resulting intensity pairs.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rigtk_core::filter::sample_physical_points;
use rigtk_core::image::grid::unravel_index;
use rigtk_core::transform::Transform;
use rigtk_core::{Image, InterpolatorKind, Point, TransformFamily};
use crate::error::{RegistrationError, Result};
use crate::metric::{IntensityStats, Metric, MetricSamples};
use crate::optimizer::objective::{central_difference, CostFunction, DEFAULT_GRADIENT_STEP};
use crate::parameters::SampleSelection;
use crate::validation::validate_image_shapes;

/// Seed of the fixed random sample subset.
pub const SAMPLING_SEED: u64 = 121_212;

/// Images taking part in one cost evaluation.
#[derive(Debug, Clone, Copy)]
pub struct CostInputs<'a, B: Backend, const D: usize> {
    pub fixed: &'a Image<B, D>,
    pub moving: &'a Image<B, D>,
    /// Non-zero voxels are inside; must match the fixed image's shape.
    pub fixed_mask: Option<&'a Image<B, D>>,
    /// Non-zero voxels are inside; sampled nearest at mapped points.
    pub moving_mask: Option<&'a Image<B, D>>,
}

impl<'a, B: Backend, const D: usize> CostInputs<'a, B, D> {
    pub fn new(fixed: &'a Image<B, D>, moving: &'a Image<B, D>) -> Self {
        Self {
            fixed,
            moving,
            fixed_mask: None,
            moving_mask: None,
        }
    }

    pub fn with_masks(mut self, fixed_mask: Option<&'a Image<B, D>>, moving_mask: Option<&'a Image<B, D>>) -> Self {
        self.fixed_mask = fixed_mask;
        self.moving_mask = moving_mask;
        self
    }
}

pub struct ImageMetricCost<'a, B: Backend, const D: usize> {
    moving: &'a Image<B, D>,
    moving_mask: Option<&'a Image<B, D>>,
    metric: Box<dyn Metric>,
    family: TransformFamily,
    center: Point<D>,
    interpolator: InterpolatorKind,
    gradient_step: f64,
    /// `[N, D]` physical sample points of the fixed image.
    points: Tensor<B, 2>,
    sample_count: usize,
    fixed_values: Vec<f64>,
    fixed_valid: Vec<bool>,
    grid: Option<Vec<usize>>,
    fixed_stats: IntensityStats,
    moving_stats: IntensityStats,
    evaluations: usize,
}

impl<'a, B: Backend, const D: usize> ImageMetricCost<'a, B, D> {
    /// Select the fixed sample points and cache both images' statistics.
    pub fn new(inputs: CostInputs<'a, B, D>, metric: Box<dyn Metric>, selection: SampleSelection) -> Result<Self> {
        let fixed = inputs.fixed;
        let fixed_all = fixed.to_values()?;
        let fixed_inside: Vec<bool> = match inputs.fixed_mask {
            Some(mask) => {
                validate_image_shapes(fixed, mask)?;
                mask.to_values()?.into_iter().map(|v| v != 0.0).collect()
            }
            None => vec![true; fixed_all.len()],
        };
        if let Some(mask) = inputs.moving_mask {
            validate_image_shapes(inputs.moving, mask)?;
        }

        let selection = if metric.requires_dense_grid() {
            SampleSelection::Dense
        } else {
            selection
        };
        let candidates: Vec<usize> = (0..fixed_all.len()).filter(|&i| fixed_inside[i]).collect();
        if candidates.is_empty() {
            return Err(RegistrationError::image_validation("fixed mask excludes every voxel"));
        }

        let (flat, grid): (Vec<usize>, Option<Vec<usize>>) = match selection {
            SampleSelection::Dense => ((0..fixed_all.len()).collect(), Some(fixed.size().to_vec())),
            SampleSelection::Random { count } if count < candidates.len() => {
                let mut rng = StdRng::seed_from_u64(SAMPLING_SEED);
                let mut picked: Vec<usize> = rand::seq::index::sample(&mut rng, candidates.len(), count)
                    .into_iter()
                    .map(|i| candidates[i])
                    .collect();
                picked.sort_unstable();
                (picked, None)
            }
            SampleSelection::Random { .. } => (candidates, None),
        };

        let shape = fixed.shape();
        let mut coordinates = Vec::with_capacity(flat.len() * D);
        for &i in &flat {
            let index = unravel_index(i, shape);
            let mut continuous = Point::<D>::origin();
            for axis in 0..D {
                continuous[axis] = index[axis] as f64;
            }
            let point = fixed.transform_continuous_index_to_physical_point(&continuous);
            coordinates.extend((0..D).map(|axis| point[axis] as f32));
        }
        let device = inputs.moving.data().device();
        let points = Tensor::<B, 2>::from_data(TensorData::new(coordinates, Shape::new([flat.len(), D])), &device);
        let fixed_values = flat.iter().map(|&i| fixed_all[i]).collect();
        let fixed_valid = flat.iter().map(|&i| fixed_inside[i]).collect();

        let fixed_stats = IntensityStats::from_values(&fixed_all);
        let moving_stats = IntensityStats::from_values(&inputs.moving.to_values()?);

        tracing::debug!(
            metric = metric.name(),
            samples = flat.len(),
            dense = grid.is_some(),
            "selected fixed sample points"
        );

        Ok(Self {
            moving: inputs.moving,
            moving_mask: inputs.moving_mask,
            metric,
            family: TransformFamily::Translation,
            center: Point::origin(),
            interpolator: InterpolatorKind::Linear,
            gradient_step: DEFAULT_GRADIENT_STEP,
            points,
            sample_count: flat.len(),
            fixed_values,
            fixed_valid,
            grid,
            fixed_stats,
            moving_stats,
            evaluations: 0,
        })
    }

    /// Transform family and center of rotation for non-centered families.
    pub fn with_transform(mut self, family: TransformFamily, center: Point<D>) -> Result<Self> {
        family.require_parameter_count(D)?;
        self.family = family;
        self.center = center;
        Ok(self)
    }

    pub fn with_interpolator(mut self, interpolator: InterpolatorKind) -> Self {
        self.interpolator = interpolator;
        self
    }

    pub fn with_gradient_step(mut self, step: f64) -> Self {
        self.gradient_step = step;
        self
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn metric_name(&self) -> &'static str {
        self.metric.name()
    }

    /// Intensity pairs for `parameters`.
    pub fn samples(&self, parameters: &[f64]) -> Result<MetricSamples> {
        let map = self.family.to_affine::<D>(parameters, &self.center)?;
        let mapped = map.transform_points(self.points.clone());

        let sampled = sample_physical_points(self.moving, mapped.clone(), self.interpolator)?;
        let mut valid: Vec<bool> = self
            .fixed_valid
            .iter()
            .zip(&sampled.inside)
            .map(|(fixed_ok, inside)| *fixed_ok && *inside)
            .collect();
        if let Some(mask) = self.moving_mask {
            let mask_values = sample_physical_points(mask, mapped, InterpolatorKind::NearestNeighbor)?;
            for (v, m) in valid.iter_mut().zip(&mask_values.values) {
                *v = *v && *m != 0.0;
            }
        }

        let samples = MetricSamples {
            fixed: self.fixed_values.clone(),
            moving: sampled.values,
            valid,
            grid: self.grid.clone(),
            fixed_stats: self.fixed_stats,
            moving_stats: self.moving_stats,
        };
        Ok(samples)
    }
}

impl<B: Backend, const D: usize> CostFunction for ImageMetricCost<'_, B, D> {
    fn parameter_count(&self) -> usize {
        self.family.parameter_count(D).unwrap_or(0)
    }

    fn value(&mut self, parameters: &DVector<f64>) -> Result<f64> {
        self.evaluations += 1;
        let samples = self.samples(parameters.as_slice())?;
        self.metric.evaluate(&samples)
    }

    /// Central differences of the metric.
    ///
    /// Nearest sampling is piecewise constant, so sub-voxel perturbations see
    /// no change; the gradient is always taken on the linearly interpolated
    /// moving image.
    fn gradient(&mut self, parameters: &DVector<f64>) -> Result<DVector<f64>> {
        let step = self.gradient_step;
        let sampling = std::mem::replace(&mut self.interpolator, InterpolatorKind::Linear);
        let gradient = central_difference(self, parameters, step);
        self.interpolator = sampling;
        gradient
    }
}
