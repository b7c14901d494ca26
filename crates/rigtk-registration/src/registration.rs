//! Single-resolution registration engine.
//!
//! [`ImageRegistrationMethod`] wires a transform family, a metric, an
//! optimizer and an interpolator around one fixed and one moving image,
//! seeds the transform, and runs the optimizer to its own termination
//! condition while a [`RegistrationObserver`] reports every iteration.

use burn::tensor::backend::Backend;
use nalgebra::{DVector, Matrix4};
use rigtk_core::filter::{GaussianFilter, ResampleImageFilter};
use rigtk_core::image::grid::unravel_index;
use rigtk_core::{AffineMap, Image, InterpolatorKind, Point, TransformFamily};
use serde::{Deserialize, Serialize};
use crate::apply::registration_matrix;
use crate::cost::{CostInputs, ImageMetricCost};
use crate::error::{RegistrationError, Result};
use crate::observer::RegistrationObserver;
use crate::optimizer::StopCondition;
use crate::parameters::{validate_configuration, Initializer, MetricParameters, OptimizerParameters, TransformParameters};
use crate::validation::{validate_image_shapes, validate_non_empty};

/// Outcome of one pyramid level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: usize,
    pub parameters: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub stop_condition: StopCondition,
}

/// Converged (or cooperatively stopped) registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationResult {
    pub family: TransformFamily,
    pub parameters: Vec<f64>,
    /// Center of rotation for families without explicit center parameters.
    pub center: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub stop_condition: StopCondition,
    /// One entry per executed pyramid level; empty for single-resolution runs.
    pub levels: Vec<LevelSummary>,
}

impl RegistrationResult {
    /// Whether the run ended on a cooperative stop.
    pub fn was_stopped(&self) -> bool {
        self.stop_condition == StopCondition::UserRequested
    }

    /// The fixed-to-moving map as a `D`-dimensional affine map.
    pub fn affine<const D: usize>(&self) -> Result<AffineMap<D>> {
        let center = Point::<D>::from_slice(&self.center).ok_or_else(|| {
            RegistrationError::dimension_mismatch(format!(
                "result center has {} components, expected {D}",
                self.center.len()
            ))
        })?;
        Ok(self.family.to_affine::<D>(&self.parameters, &center)?)
    }

    /// The fixed-to-moving map as a 4×4 homogeneous matrix.
    pub fn matrix(&self) -> Result<Matrix4<f64>> {
        registration_matrix(self.family, &self.parameters, &self.center)
    }
}

/// Where a level starts: parameters and the center of rotation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LevelStart {
    pub parameters: Vec<f64>,
    pub center: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ImageRegistrationMethod<'a, B: Backend, const D: usize> {
    fixed: &'a Image<B, D>,
    moving: &'a Image<B, D>,
    fixed_mask: Option<&'a Image<B, D>>,
    moving_mask: Option<&'a Image<B, D>>,
    transform: TransformParameters,
    metric: MetricParameters,
    optimizer: OptimizerParameters,
    interpolator: InterpolatorKind,
}

impl<'a, B: Backend, const D: usize> ImageRegistrationMethod<'a, B, D> {
    pub fn new(fixed: &'a Image<B, D>, moving: &'a Image<B, D>) -> Self {
        Self {
            fixed,
            moving,
            fixed_mask: None,
            moving_mask: None,
            transform: TransformParameters::default(),
            metric: MetricParameters::default(),
            optimizer: OptimizerParameters::default(),
            interpolator: InterpolatorKind::Linear,
        }
    }

    pub fn with_fixed_mask(mut self, mask: &'a Image<B, D>) -> Self {
        self.fixed_mask = Some(mask);
        self
    }

    pub fn with_moving_mask(mut self, mask: &'a Image<B, D>) -> Self {
        self.moving_mask = Some(mask);
        self
    }

    pub fn with_transform_parameters(mut self, transform: TransformParameters) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_metric_parameters(mut self, metric: MetricParameters) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_optimizer_parameters(mut self, optimizer: OptimizerParameters) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_interpolator(mut self, interpolator: InterpolatorKind) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// Select the interpolator by code: `0` linear, `1` nearest neighbor.
    pub fn with_interpolator_code(self, code: i32) -> Result<Self> {
        let kind = InterpolatorKind::from_code(code).ok_or_else(|| {
            RegistrationError::invalid_configuration(format!("unknown interpolator code {code}"))
        })?;
        Ok(self.with_interpolator(kind))
    }

    pub fn transform_parameters(&self) -> &TransformParameters {
        &self.transform
    }

    pub fn metric_parameters(&self) -> &MetricParameters {
        &self.metric
    }

    pub fn optimizer_parameters(&self) -> &OptimizerParameters {
        &self.optimizer
    }

    pub fn interpolator(&self) -> InterpolatorKind {
        self.interpolator
    }

    /// The moving image resampled onto the fixed grid through `result`.
    ///
    /// Voxels whose mapped point leaves the moving buffer are zero.
    pub fn resample_moving(&self, result: &RegistrationResult) -> Result<Image<B, D>> {
        let map = result.affine::<D>()?;
        Ok(ResampleImageFilter::new_from_reference(self.fixed, map, self.interpolator).apply(self.moving)?)
    }

    /// Check every input before any pixel work.
    pub fn validate(&self) -> Result<usize> {
        let parameter_count = validate_configuration(D, &self.transform, &self.metric, &self.optimizer)?;
        validate_non_empty(self.fixed, "fixed")?;
        validate_non_empty(self.moving, "moving")?;
        if let Some(mask) = self.fixed_mask {
            validate_image_shapes(self.fixed, mask)?;
        }
        if let Some(mask) = self.moving_mask {
            validate_image_shapes(self.moving, mask)?;
        }
        Ok(parameter_count)
    }

    /// Run the registration to completion.
    ///
    /// Declares the optimizer's iteration budget on the observer's progress
    /// tracker. On failure the error is logged, the progress is forced to
    /// completion and the error is returned.
    pub fn update(&self, observer: &mut RegistrationObserver) -> Result<RegistrationResult> {
        let progress = observer.progress().clone();
        progress.start();
        let run = self.validate().and_then(|parameter_count| {
            progress.add_steps_to_do(self.optimizer.iteration_budget(parameter_count));
            self.run_level(observer, None)
        });
        match run {
            Ok(result) => {
                progress.complete();
                Ok(result)
            }
            Err(error) => {
                tracing::error!(%error, "registration failed");
                progress.error(&error.to_string());
                Err(error)
            }
        }
    }

    /// One optimizer run, from `start` or from the configured initialization.
    pub(crate) fn run_level(
        &self,
        observer: &mut RegistrationObserver,
        start: Option<&LevelStart>,
    ) -> Result<RegistrationResult> {
        let parameter_count = self.validate()?;
        if self.optimizer.maximize != self.metric.prefers_maximize() {
            tracing::warn!(
                metric = self.metric.family.name(),
                maximize = self.optimizer.maximize,
                "optimizer direction is contrary to the metric's natural direction"
            );
        }

        let smoothed = self.metric.smoothing_variances().map(|(fixed_variance, moving_variance)| {
            (
                GaussianFilter::<B>::new(vec![fixed_variance.sqrt(); D]).apply(self.fixed),
                GaussianFilter::<B>::new(vec![moving_variance.sqrt(); D]).apply(self.moving),
            )
        });
        let (fixed, moving) = match &smoothed {
            Some((fixed, moving)) => (fixed, moving),
            None => (self.fixed, self.moving),
        };

        let start = match start {
            Some(start) => start.clone(),
            None => self.initial_state(parameter_count)?,
        };
        let center = Point::<D>::from_slice(&start.center).ok_or_else(|| {
            RegistrationError::dimension_mismatch(format!("center {:?} is not {D}D", start.center))
        })?;

        tracing::info!(
            transform = self.transform.family.name(),
            metric = self.metric.family.name(),
            optimizer = self.optimizer.name(),
            fixed_size = ?fixed.size(),
            moving_size = ?moving.size(),
            parameter_count,
            "starting registration"
        );

        let inputs = CostInputs::new(fixed, moving).with_masks(self.fixed_mask, self.moving_mask);
        let mut cost = ImageMetricCost::new(inputs, self.metric.build()?, self.metric.sample_selection())?
            .with_transform(self.transform.family, center)?
            .with_interpolator(self.interpolator);
        let scales = self.transform.resolved_scales(D)?;
        let mut optimizer = self.optimizer.build(parameter_count, scales)?;

        observer.begin_run();
        let outcome = optimizer.optimize(&mut cost, DVector::from_vec(start.parameters), observer)?;

        tracing::info!(
            value = outcome.value,
            iterations = outcome.iterations,
            stop_condition = ?outcome.stop_condition,
            evaluations = cost.evaluations(),
            "registration finished"
        );

        Ok(RegistrationResult {
            family: self.transform.family,
            parameters: outcome.position.iter().copied().collect(),
            center: start.center,
            value: outcome.value,
            iterations: outcome.iterations,
            stop_condition: outcome.stop_condition,
            levels: Vec::new(),
        })
    }

    /// Seed the transform according to the configured initializer.
    pub(crate) fn initial_state(&self, parameter_count: usize) -> Result<LevelStart> {
        let family = self.transform.family;
        let mut parameters = self.transform.identity_parameters(D)?;

        let (center, translation) = match self.transform.initializer() {
            Initializer::Off => (self.transform.user_center(D), None),
            Initializer::GeometryCenter => {
                let fixed_center = self.fixed.physical_center().to_vec();
                let moving_center = self.moving.physical_center().to_vec();
                (fixed_center.clone(), Some(difference(&moving_center, &fixed_center)))
            }
            Initializer::Moments => {
                let fixed_centroid = intensity_centroid(self.fixed, "fixed")?;
                let moving_centroid = intensity_centroid(self.moving, "moving")?;
                (fixed_centroid.clone(), Some(difference(&moving_centroid, &fixed_centroid)))
            }
        };

        if let (Some(translation), Some(range)) = (&translation, family.translation_range(D)) {
            for (slot, value) in parameters[range].iter_mut().zip(translation) {
                *slot = *value;
            }
        }

        let center_range = family.center_range(D);
        if let Some(initial) = &self.transform.initial_parameters {
            for (i, value) in initial.iter().enumerate().take(parameter_count) {
                if center_range.as_ref().map_or(true, |r| !r.contains(&i)) {
                    parameters[i] = *value;
                }
            }
        }
        if let Some(range) = center_range {
            for (slot, value) in parameters[range].iter_mut().zip(&center) {
                *slot = *value;
            }
        }

        tracing::debug!(initializer = ?self.transform.initializer(), ?center, ?parameters, "initial transform");
        Ok(LevelStart { parameters, center })
    }
}

fn difference(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Intensity-weighted mean physical position.
fn intensity_centroid<B: Backend, const D: usize>(image: &Image<B, D>, role: &str) -> Result<Vec<f64>> {
    let values = image.to_values()?;
    let shape = image.shape();
    let mut mass = 0.0;
    let mut weighted = vec![0.0; D];
    for (flat, &value) in values.iter().enumerate() {
        if value == 0.0 {
            continue;
        }
        let index = unravel_index(flat, shape);
        let mut continuous = Point::<D>::origin();
        for axis in 0..D {
            continuous[axis] = index[axis] as f64;
        }
        let physical = image.transform_continuous_index_to_physical_point(&continuous);
        mass += value;
        for axis in 0..D {
            weighted[axis] += value * physical[axis];
        }
    }
    if mass.abs() < f64::EPSILON || !mass.is_finite() {
        return Err(RegistrationError::numerical_instability(format!(
            "{role} image has zero total intensity; moments are undefined"
        )));
    }
    Ok(weighted.into_iter().map(|w| w / mass).collect())
}
