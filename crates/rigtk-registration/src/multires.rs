//! Coarse-to-fine registration over a pair of image pyramids.
//!
//! Each level runs a full [`ImageRegistrationMethod`] on the level's
//! downsampled images, continuing from the previous level's parameters.
//! Step-length optimizers are tightened between levels; other families run
//! every level with the caller's settings.

use burn::tensor::backend::Backend;
use rigtk_core::filter::{DownsampleFilter, HistogramMatchingFilter, MultiResolutionPyramid};
use rigtk_core::{Image, InterpolatorKind, PyramidSchedule};
use crate::error::{RegistrationError, Result};
use crate::observer::RegistrationObserver;
use crate::optimizer::StopCondition;
use crate::parameters::{validate_configuration, MetricParameters, OptimizerParameters, TransformParameters};
use crate::registration::{ImageRegistrationMethod, LevelStart, LevelSummary, RegistrationResult};
use crate::validation::{validate_image_shapes, validate_non_empty};

#[derive(Debug, Clone)]
pub struct PyramidalRegistrationMethod<'a, B: Backend, const D: usize> {
    fixed: &'a Image<B, D>,
    moving: &'a Image<B, D>,
    fixed_mask: Option<&'a Image<B, D>>,
    moving_mask: Option<&'a Image<B, D>>,
    fixed_schedule: PyramidSchedule,
    moving_schedule: PyramidSchedule,
    match_histograms: bool,
    transform: TransformParameters,
    metric: MetricParameters,
    optimizer: OptimizerParameters,
    interpolator: InterpolatorKind,
}

impl<'a, B: Backend, const D: usize> PyramidalRegistrationMethod<'a, B, D> {
    /// A three-level power-of-two cascade for both images.
    pub fn new(fixed: &'a Image<B, D>, moving: &'a Image<B, D>) -> Self {
        Self {
            fixed,
            moving,
            fixed_mask: None,
            moving_mask: None,
            fixed_schedule: PyramidSchedule::power_of_two(3, D),
            moving_schedule: PyramidSchedule::power_of_two(3, D),
            match_histograms: false,
            transform: TransformParameters::default(),
            metric: MetricParameters::default(),
            optimizer: OptimizerParameters::default(),
            interpolator: InterpolatorKind::Linear,
        }
    }

    pub fn with_fixed_schedule(mut self, schedule: PyramidSchedule) -> Self {
        self.fixed_schedule = schedule;
        self
    }

    pub fn with_moving_schedule(mut self, schedule: PyramidSchedule) -> Self {
        self.moving_schedule = schedule;
        self
    }

    /// Use the same shrink factors for both images.
    pub fn with_schedule(self, schedule: PyramidSchedule) -> Self {
        self.with_fixed_schedule(schedule.clone()).with_moving_schedule(schedule)
    }

    /// Map the moving intensities onto the fixed distribution before the cascade.
    pub fn with_match_histograms(mut self, match_histograms: bool) -> Self {
        self.match_histograms = match_histograms;
        self
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

    pub fn with_interpolator_code(self, code: i32) -> Result<Self> {
        let kind = InterpolatorKind::from_code(code).ok_or_else(|| {
            RegistrationError::invalid_configuration(format!("unknown interpolator code {code}"))
        })?;
        Ok(self.with_interpolator(kind))
    }

    pub fn levels(&self) -> usize {
        self.fixed_schedule.levels()
    }

    pub fn validate(&self) -> Result<usize> {
        let parameter_count = validate_configuration(D, &self.transform, &self.metric, &self.optimizer)?;
        self.fixed_schedule.validate(D)?;
        self.moving_schedule.validate(D)?;
        if self.fixed_schedule.levels() != self.moving_schedule.levels() {
            return Err(RegistrationError::invalid_configuration(format!(
                "fixed schedule has {} levels, moving schedule has {}",
                self.fixed_schedule.levels(),
                self.moving_schedule.levels()
            )));
        }
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

    /// Optimizer settings per level, coarsest first.
    fn level_optimizers(&self) -> Vec<OptimizerParameters> {
        let mut current = self.optimizer.clone();
        let mut optimizers = Vec::with_capacity(self.levels());
        for level in 0..self.levels() {
            if level > 0 {
                if let Some(next) = current.adapted_for_next_level() {
                    current = next;
                }
            }
            optimizers.push(current.clone());
        }
        optimizers
    }

    /// Iteration callbacks expected over the whole cascade.
    pub fn total_steps(&self, parameter_count: usize) -> usize {
        self.level_optimizers()
            .iter()
            .map(|o| o.iteration_budget(parameter_count))
            .fold(0usize, usize::saturating_add)
    }

    /// Run the cascade to completion.
    ///
    /// A cooperative stop ends the cascade with the partial result. A
    /// failure at any level aborts it.
    pub fn update(&self, observer: &mut RegistrationObserver) -> Result<RegistrationResult> {
        let progress = observer.progress().clone();
        progress.start();
        let run = self.validate().and_then(|parameter_count| {
            progress.add_steps_to_do(self.total_steps(parameter_count));
            self.run_cascade(observer, parameter_count)
        });
        match run {
            Ok(result) => {
                progress.complete();
                Ok(result)
            }
            Err(error) => {
                tracing::error!(%error, "pyramidal registration failed");
                progress.error(&error.to_string());
                Err(error)
            }
        }
    }

    fn run_cascade(&self, observer: &mut RegistrationObserver, parameter_count: usize) -> Result<RegistrationResult> {
        let matched;
        let moving = if self.match_histograms {
            tracing::debug!("matching moving histogram to fixed");
            matched = HistogramMatchingFilter::default().apply(self.moving, self.fixed)?;
            &matched
        } else {
            self.moving
        };

        let fixed_levels = MultiResolutionPyramid::new(self.fixed, &self.fixed_schedule)?.into_levels();
        let moving_levels = MultiResolutionPyramid::new(moving, &self.moving_schedule)?.into_levels();
        let fixed_masks = downsample_mask(self.fixed_mask, &self.fixed_schedule)?;
        let moving_masks = downsample_mask(self.moving_mask, &self.moving_schedule)?;

        let mut start = ImageRegistrationMethod::new(self.fixed, moving)
            .with_transform_parameters(self.transform.clone())
            .initial_state(parameter_count)?;

        let levels = self.levels();
        let optimizers = self.level_optimizers();
        let mut summaries = Vec::with_capacity(levels);
        let mut total_iterations = 0;
        let mut last: Option<RegistrationResult> = None;

        for level in 0..levels {
            if level > 0 && self.optimizer.adapted_for_next_level().is_none() {
                tracing::warn!(
                    optimizer = self.optimizer.name(),
                    level,
                    "optimizer has no step-length settings; level adaptation skipped"
                );
            }

            let fixed_level = &fixed_levels[level];
            let moving_level = &moving_levels[level];
            tracing::info!(
                level = level + 1,
                levels,
                fixed_size = ?fixed_level.size(),
                moving_size = ?moving_level.size(),
                "starting pyramid level"
            );

            let mut method = ImageRegistrationMethod::new(fixed_level, moving_level)
                .with_transform_parameters(self.transform.clone())
                .with_metric_parameters(self.metric.clone())
                .with_optimizer_parameters(optimizers[level].clone())
                .with_interpolator(self.interpolator);
            if let Some(masks) = &fixed_masks {
                method = method.with_fixed_mask(&masks[level]);
            }
            if let Some(masks) = &moving_masks {
                method = method.with_moving_mask(&masks[level]);
            }

            let mut result = method.run_level(observer, Some(&start))?;
            total_iterations += result.iterations;
            summaries.push(LevelSummary {
                level,
                parameters: result.parameters.clone(),
                value: result.value,
                iterations: result.iterations,
                stop_condition: result.stop_condition,
            });
            start = LevelStart {
                parameters: result.parameters.clone(),
                center: result.center.clone(),
            };

            let cut_short = observer.stop_requested() && level + 1 < levels;
            if cut_short {
                result.stop_condition = StopCondition::UserRequested;
            }
            let stopped = result.stop_condition == StopCondition::UserRequested;
            last = Some(result);
            if stopped {
                tracing::info!(level = level + 1, levels, "stop requested; ending cascade");
                break;
            }
        }

        let mut result = last.ok_or_else(|| RegistrationError::invalid_configuration("schedule has no levels"))?;
        result.iterations = total_iterations;
        result.levels = summaries;
        tracing::info!(
            value = result.value,
            iterations = result.iterations,
            levels = result.levels.len(),
            "pyramidal registration finished"
        );
        Ok(result)
    }
}

/// Mask per level, downsampled without smoothing so it stays binary.
fn downsample_mask<B: Backend, const D: usize>(
    mask: Option<&Image<B, D>>,
    schedule: &PyramidSchedule,
) -> Result<Option<Vec<Image<B, D>>>> {
    let Some(mask) = mask else {
        return Ok(None);
    };
    schedule
        .factors()
        .iter()
        .map(|factors| Ok(DownsampleFilter::new(factors.clone()).apply(mask)?))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}
