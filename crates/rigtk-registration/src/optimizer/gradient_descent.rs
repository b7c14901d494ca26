//! Plain gradient descent with a fixed learning rate.
//!
//! The quaternion variant renormalizes the leading four parameters
//! (`x, y, z, w`) after every step, for quaternion rigid transforms.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, unscale, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientDescentSettings {
    pub learning_rate: f64,
    pub number_of_iterations: usize,
}

impl Default for GradientDescentSettings {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            number_of_iterations: 100,
        }
    }
}

/// Gradient descent: `x -= learning_rate * g / scale`.
pub struct GradientDescentOptimizer {
    settings: GradientDescentSettings,
    scales: DVector<f64>,
    maximize: bool,
    normalize_quaternion: bool,
    state: IterationState,
}

impl GradientDescentOptimizer {
    pub fn new(settings: GradientDescentSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self {
            settings,
            scales,
            maximize,
            normalize_quaternion: false,
            state,
        }
    }

    pub fn quaternion(settings: GradientDescentSettings, scales: DVector<f64>, maximize: bool) -> Self {
        Self {
            normalize_quaternion: true,
            ..Self::new(settings, scales, maximize)
        }
    }

    pub fn settings(&self) -> &GradientDescentSettings {
        &self.settings
    }
}

fn normalize_leading_quaternion(x: &mut DVector<f64>) {
    if x.len() < 4 {
        return;
    }
    let norm = x.rows(0, 4).norm();
    if norm > f64::EPSILON {
        x.rows_mut(0, 4).unscale_mut(norm);
    }
}

impl Optimizer for GradientDescentOptimizer {
    fn name(&self) -> &'static str {
        if self.normalize_quaternion {
            "QuaternionRigidGradientDescent"
        } else {
            "GradientDescent"
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
        let mut objective = Objective::new(cost, self.maximize);
        let mut x = initial;
        let mut stop_condition = StopCondition::MaximumIterations;

        for _ in 0..self.settings.number_of_iterations {
            let (value, gradient) = objective.value_and_gradient(&x)?;
            x -= unscale(&gradient, &self.scales) * self.settings.learning_rate;
            if self.normalize_quaternion {
                normalize_leading_quaternion(&mut x);
            }
            if report(self, observer, &x, objective.raw(value)) {
                stop_condition = StopCondition::UserRequested;
                break;
            }
        }

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
