//! Bound-constrained L-BFGS with a projected backtracking line search.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::{RegistrationError, Result};
use super::lbfgs::{LbfgsMemory, ARMIJO};
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

const MAX_BACKTRACKS: usize = 30;
/// Relative value-change factor, in units of machine epsilon.
const COST_CONVERGENCE_FACTOR: f64 = 1e7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbfgsbSettings {
    pub max_iterations: usize,
    pub projected_gradient_tolerance: f64,
    /// Number of stored corrections.
    pub memory: usize,
    pub lower_bounds: Option<Vec<f64>>,
    pub upper_bounds: Option<Vec<f64>>,
}

impl Default for LbfgsbSettings {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            projected_gradient_tolerance: 1e-5,
            memory: 5,
            lower_bounds: None,
            upper_bounds: None,
        }
    }
}

impl LbfgsbSettings {
    pub fn validate(&self, parameter_count: usize) -> Result<()> {
        if self.memory == 0 {
            return Err(RegistrationError::invalid_configuration("LBFGSB memory must be at least 1"));
        }
        for (name, bounds) in [("lower", &self.lower_bounds), ("upper", &self.upper_bounds)] {
            if let Some(b) = bounds {
                if b.len() != parameter_count {
                    return Err(RegistrationError::invalid_configuration(format!(
                        "LBFGSB {name} bounds have {} entries, expected {parameter_count}",
                        b.len()
                    )));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (&self.lower_bounds, &self.upper_bounds) {
            if lo.iter().zip(hi).any(|(l, h)| l > h) {
                return Err(RegistrationError::invalid_configuration(
                    "LBFGSB lower bound exceeds upper bound",
                ));
            }
        }
        Ok(())
    }
}

struct Bounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Bounds {
    fn from_settings(settings: &LbfgsbSettings, n: usize) -> Self {
        let lower = settings
            .lower_bounds
            .as_ref()
            .map_or_else(|| DVector::from_element(n, f64::NEG_INFINITY), |b| DVector::from_column_slice(b));
        let upper = settings
            .upper_bounds
            .as_ref()
            .map_or_else(|| DVector::from_element(n, f64::INFINITY), |b| DVector::from_column_slice(b));
        Self { lower, upper }
    }

    fn project(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            x.len(),
            x.iter().enumerate().map(|(i, v)| v.clamp(self.lower[i], self.upper[i])),
        )
    }

    /// ∞-norm of `P(x - g) - x`.
    fn projected_gradient_norm(&self, x: &DVector<f64>, g: &DVector<f64>) -> f64 {
        (self.project(&(x - g)) - x).amax()
    }

    /// Zero direction components that push an active variable outside its bound.
    fn restrict(&self, x: &DVector<f64>, d: &mut DVector<f64>) {
        for i in 0..x.len() {
            let at_lower = x[i] <= self.lower[i] && d[i] < 0.0;
            let at_upper = x[i] >= self.upper[i] && d[i] > 0.0;
            if at_lower || at_upper {
                d[i] = 0.0;
            }
        }
    }
}

pub struct LbfgsbOptimizer {
    settings: LbfgsbSettings,
    scales: DVector<f64>,
    maximize: bool,
    state: IterationState,
}

impl LbfgsbOptimizer {
    pub fn new(settings: LbfgsbSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self { settings, scales, maximize, state }
    }
}

impl Optimizer for LbfgsbOptimizer {
    fn name(&self) -> &'static str {
        "LBFGSB"
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
        self.settings.validate(initial.len())?;
        begin(self, &initial);
        let bounds = Bounds::from_settings(&self.settings, initial.len());
        let mut objective = Objective::new(cost, self.maximize);
        let mut memory = LbfgsMemory::new(self.settings.memory);
        let mut x = bounds.project(&initial);
        let (mut f, mut g) = objective.value_and_gradient(&x)?;
        let mut stop_condition = StopCondition::MaximumIterations;

        for iteration in 0..self.settings.max_iterations {
            if bounds.projected_gradient_norm(&x, &g) < self.settings.projected_gradient_tolerance {
                stop_condition = StopCondition::GradientTolerance;
                break;
            }
            let mut direction = -memory.apply(&g, &self.scales);
            bounds.restrict(&x, &mut direction);
            if g.dot(&direction) >= 0.0 {
                memory.clear();
                direction = -g.component_div(&self.scales);
                bounds.restrict(&x, &mut direction);
            }

            let mut t = if iteration == 0 { 1.0 / direction.amax().max(1.0) } else { 1.0 };
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let candidate = bounds.project(&(&x + &direction * t));
                let value = objective.value(&candidate)?;
                if value <= f + ARMIJO * g.dot(&(&candidate - &x)) {
                    accepted = Some((candidate, value));
                    break;
                }
                t *= 0.5;
            }
            let Some((x_new, f_new)) = accepted else {
                stop_condition = StopCondition::StepTooSmall;
                break;
            };
            let g_new = objective.gradient(&x_new)?;
            memory.push(&x_new - &x, &g_new - &g);

            let relative_change = (f - f_new) / f.abs().max(f_new.abs()).max(1.0);
            x = x_new;
            f = f_new;
            g = g_new;
            report(self, observer, &x, objective.raw(f));

            if relative_change <= COST_CONVERGENCE_FACTOR * f64::EPSILON {
                stop_condition = StopCondition::Converged;
                break;
            }
        }

        Ok(OptimizationOutcome {
            value: objective.raw(f),
            position: x,
            iterations: self.state.iteration,
            stop_condition,
        })
    }
}
