//! Regular-step gradient descent and its versor variants.
//!
//! The step starts at `max_step_length` and is multiplied by the relaxation
//! factor whenever the scaled gradient reverses direction. The run stops once
//! the step drops below `min_step_length` or the scaled gradient magnitude
//! drops below `gradient_magnitude_tolerance`.

use nalgebra::{DVector, Vector3};
use rigtk_core::transform::rotation::{versor, versor_from_axis_angle, versor_right_part};
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, unscale, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularStepSettings {
    pub gradient_magnitude_tolerance: f64,
    pub min_step_length: f64,
    pub max_step_length: f64,
    pub relaxation_factor: f64,
    pub number_of_iterations: usize,
}

impl Default for RegularStepSettings {
    fn default() -> Self {
        Self {
            gradient_magnitude_tolerance: 1e-4,
            min_step_length: 1e-3,
            max_step_length: 1.0,
            relaxation_factor: 0.5,
            number_of_iterations: 100,
        }
    }
}

impl RegularStepSettings {
    /// Settings for the next finer pyramid level.
    pub fn refined(&self) -> Self {
        Self {
            max_step_length: self.max_step_length * 0.25,
            min_step_length: self.min_step_length * 0.1,
            gradient_magnitude_tolerance: self.gradient_magnitude_tolerance * 0.1,
            number_of_iterations: (self.number_of_iterations as f64 * 1.5).round() as usize,
            ..self.clone()
        }
    }
}

/// How a step along the scaled gradient is applied to the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRule {
    /// `x += factor * g`.
    Additive,
    /// Parameters are a versor right part; the step composes a rotation.
    Versor,
    /// Versor in the first three slots, additive translation after.
    VersorRigid,
}

pub struct RegularStepGradientDescent {
    settings: RegularStepSettings,
    scales: DVector<f64>,
    maximize: bool,
    rule: StepRule,
    current_step: f64,
    state: IterationState,
}

impl RegularStepGradientDescent {
    pub fn new(settings: RegularStepSettings, scales: DVector<f64>, maximize: bool, rule: StepRule) -> Self {
        let state = IterationState::new(scales.len());
        let current_step = settings.max_step_length;
        Self {
            settings,
            scales,
            maximize,
            rule,
            current_step,
            state,
        }
    }

    pub fn current_step_length(&self) -> f64 {
        self.current_step
    }

    fn step_along(&self, x: &DVector<f64>, direction: &DVector<f64>, factor: f64) -> DVector<f64> {
        match self.rule {
            StepRule::Additive => x + direction * factor,
            StepRule::Versor | StepRule::VersorRigid if x.len() >= 3 => {
                let mut next = x.clone();
                let current = versor(&Vector3::new(x[0], x[1], x[2]));
                let axis = Vector3::new(direction[0], direction[1], direction[2]);
                let increment = versor_from_axis_angle(&axis, factor * axis.norm());
                let right = versor_right_part(&(current * increment));
                next.rows_mut(0, 3).copy_from(&right);
                if self.rule == StepRule::VersorRigid {
                    for i in 3..x.len() {
                        next[i] += direction[i] * factor;
                    }
                }
                next
            }
            _ => x + direction * factor,
        }
    }
}

impl Optimizer for RegularStepGradientDescent {
    fn name(&self) -> &'static str {
        match self.rule {
            StepRule::Additive => "RegularStepGradientDescent",
            StepRule::Versor => "VersorTransform",
            StepRule::VersorRigid => "VersorRigid3DTransform",
        }
    }

    fn supports_stop(&self) -> bool {
        true
    }

    fn state(&self) -> &IterationState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IterationState {
        &mut self.state
    }

    fn optimize(
        &mut self,
        cost: &mut dyn CostFunction,
        initial: DVector<f64>,
        observer: &mut dyn IterationObserver,
    ) -> Result<OptimizationOutcome> {
        begin(self, &initial);
        self.current_step = self.settings.max_step_length;
        let mut objective = Objective::new(cost, self.maximize);
        let mut x = initial;
        let mut previous: Option<DVector<f64>> = None;
        let mut stop_condition = StopCondition::MaximumIterations;

        for _ in 0..self.settings.number_of_iterations {
            let (value, gradient) = objective.value_and_gradient(&x)?;
            let transformed = unscale(&gradient, &self.scales);
            let magnitude = transformed.norm();
            if magnitude < self.settings.gradient_magnitude_tolerance {
                stop_condition = StopCondition::GradientTolerance;
                break;
            }
            if let Some(prev) = &previous {
                if transformed.dot(prev) < 0.0 {
                    self.current_step *= self.settings.relaxation_factor;
                }
            }
            if self.current_step < self.settings.min_step_length {
                stop_condition = StopCondition::StepTooSmall;
                break;
            }
            let factor = -self.current_step / magnitude;
            x = self.step_along(&x, &transformed, factor);
            previous = Some(transformed);
            if report(self, observer, &x, objective.raw(value)) {
                stop_condition = StopCondition::UserRequested;
                break;
            }
        }

        tracing::debug!(
            optimizer = self.name(),
            step = self.current_step,
            ?stop_condition,
            "regular step descent finished"
        );
        let minimized = objective.value(&x)?;
        let value = objective.raw(minimized);
        Ok(OptimizationOutcome {
            position: x,
            value,
            iterations: self.state.iteration,
            stop_condition,
        })
    }
}
