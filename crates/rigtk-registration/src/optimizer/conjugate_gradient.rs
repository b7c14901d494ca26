//! Nonlinear conjugate gradient (Polak-Ribière with automatic restarts).

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::frpr::ConjugateUpdate;
use super::line_search::line_minimize;
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, unscale, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

const LINE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConjugateGradientSettings {
    pub max_iterations: usize,
    pub gradient_tolerance: f64,
}

impl Default for ConjugateGradientSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            gradient_tolerance: 1e-5,
        }
    }
}

pub struct ConjugateGradientOptimizer {
    settings: ConjugateGradientSettings,
    scales: DVector<f64>,
    maximize: bool,
    state: IterationState,
}

impl ConjugateGradientOptimizer {
    pub fn new(settings: ConjugateGradientSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self { settings, scales, maximize, state }
    }
}

impl Optimizer for ConjugateGradientOptimizer {
    fn name(&self) -> &'static str {
        "ConjugateGradient"
    }

    fn supports_stop(&self) -> bool {
        false
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
        let mut p = initial;
        let (mut value, gradient) = objective.value_and_gradient(&p)?;
        let mut g = unscale(&gradient, &self.scales);
        let mut h = -g.clone();
        let mut stop_condition = StopCondition::MaximumIterations;

        for _ in 0..self.settings.max_iterations {
            if g.norm() < self.settings.gradient_tolerance {
                stop_condition = StopCondition::GradientTolerance;
                break;
            }
            if h.dot(&g) >= 0.0 {
                h = -g.clone();
            }
            let direction = unscale(&h, &self.scales);
            let (_, next, next_value) = line_minimize(&mut objective, &p, &direction, 1.0, LINE_TOLERANCE)?;
            let stalled = next_value >= value;
            p = next;
            value = next_value.min(value);
            // No stop support: the request flag is never set.
            report(self, observer, &p, objective.raw(value));
            if stalled {
                stop_condition = StopCondition::Converged;
                break;
            }

            let next_g = unscale(&objective.gradient(&p)?, &self.scales);
            let beta = ConjugateUpdate::PolakRibierePlus.beta(&g, &next_g);
            h = -&next_g + h * beta;
            g = next_g;
        }

        Ok(OptimizationOutcome {
            value: objective.raw(value),
            position: p,
            iterations: self.state.iteration,
            stop_condition,
        })
    }
}
