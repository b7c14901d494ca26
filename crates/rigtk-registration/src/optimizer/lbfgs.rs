//! Limited-memory BFGS.
//!
//! [`LbfgsMemory`] holds the curvature pairs and runs the standard two-loop
//! recursion; it is shared with the bound-constrained variant.

use std::collections::VecDeque;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, unscale, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

/// Sufficient-decrease constant of the line search.
pub(crate) const ARMIJO: f64 = 1e-4;
const MAX_LINE_SEARCH_STEPS: usize = 30;
const LBFGS_MEMORY: usize = 5;

/// History of `(s, y, rho)` curvature pairs.
#[derive(Debug, Clone)]
pub(crate) struct LbfgsMemory {
    capacity: usize,
    s_history: VecDeque<DVector<f64>>,
    y_history: VecDeque<DVector<f64>>,
    rho_history: VecDeque<f64>,
}

impl LbfgsMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            s_history: VecDeque::new(),
            y_history: VecDeque::new(),
            rho_history: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.s_history.is_empty()
    }

    pub fn clear(&mut self) {
        self.s_history.clear();
        self.y_history.clear();
        self.rho_history.clear();
    }

    /// Store a pair if it satisfies the curvature condition `yᵀs > 0`.
    pub fn push(&mut self, s: DVector<f64>, y: DVector<f64>) {
        let ys = y.dot(&s);
        if ys <= 1e-10 {
            return;
        }
        if self.s_history.len() >= self.capacity {
            self.s_history.pop_front();
            self.y_history.pop_front();
            self.rho_history.pop_front();
        }
        self.s_history.push_back(s);
        self.y_history.push_back(y);
        self.rho_history.push_back(1.0 / ys);
    }

    /// Approximate `H⁻¹ g`; with an empty history `g` is only preconditioned.
    pub fn apply(&self, gradient: &DVector<f64>, preconditioner: &DVector<f64>) -> DVector<f64> {
        let len = self.s_history.len();
        let mut q = gradient.clone();
        let mut alphas = vec![0.0; len];

        for i in (0..len).rev() {
            let alpha = self.rho_history[i] * self.s_history[i].dot(&q);
            alphas[i] = alpha;
            q -= &self.y_history[i] * alpha;
        }

        let mut r = match (self.s_history.back(), self.y_history.back()) {
            (Some(s), Some(y)) => {
                let gamma = s.dot(y) / y.dot(y);
                q * gamma
            }
            _ => q.component_div(preconditioner),
        };

        for i in 0..len {
            let beta = self.rho_history[i] * self.y_history[i].dot(&r);
            r += &self.s_history[i] * (alphas[i] - beta);
        }
        r
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbfgsSettings {
    pub gradient_convergence_tolerance: f64,
    /// Curvature constant of the line search; smaller means a more exact search.
    pub line_search_accuracy: f64,
    pub default_step_length: f64,
    pub number_of_iterations: usize,
    /// Log every iteration at info level.
    pub trace: bool,
}

impl Default for LbfgsSettings {
    fn default() -> Self {
        Self {
            gradient_convergence_tolerance: 1e-5,
            line_search_accuracy: 0.9,
            default_step_length: 1.0,
            number_of_iterations: 100,
            trace: false,
        }
    }
}

/// Unconstrained L-BFGS with a Wolfe line search.
pub struct LbfgsOptimizer {
    settings: LbfgsSettings,
    scales: DVector<f64>,
    maximize: bool,
    state: IterationState,
}

impl LbfgsOptimizer {
    pub fn new(settings: LbfgsSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self { settings, scales, maximize, state }
    }

    /// Backtrack until sufficient decrease, expanding while the slope stays
    /// steeper than `line_search_accuracy` times the initial slope.
    fn line_search(
        &self,
        objective: &mut Objective<'_>,
        x: &DVector<f64>,
        f: f64,
        slope: f64,
        direction: &DVector<f64>,
        initial_step: f64,
    ) -> Result<Option<(DVector<f64>, f64, DVector<f64>)>> {
        let mut t = initial_step;
        let mut accepted: Option<(DVector<f64>, f64, DVector<f64>)> = None;
        for _ in 0..MAX_LINE_SEARCH_STEPS {
            let candidate = x + direction * t;
            let value = objective.value(&candidate)?;
            if value <= f + ARMIJO * t * slope {
                let gradient = objective.gradient(&candidate)?;
                let new_slope = gradient.dot(direction);
                let steep = new_slope < 0.0 && new_slope.abs() > self.settings.line_search_accuracy * slope.abs();
                accepted = Some((candidate, value, gradient));
                if !steep {
                    break;
                }
                t *= 2.0;
            } else if accepted.is_some() {
                break;
            } else {
                t *= 0.5;
            }
        }
        Ok(accepted)
    }
}

impl Optimizer for LbfgsOptimizer {
    fn name(&self) -> &'static str {
        "LBFGS"
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
        let mut memory = LbfgsMemory::new(LBFGS_MEMORY);
        let mut x = initial;
        let (mut f, mut g) = objective.value_and_gradient(&x)?;
        let mut stop_condition = StopCondition::MaximumIterations;

        for iteration in 0..self.settings.number_of_iterations {
            if g.norm() / x.norm().max(1.0) < self.settings.gradient_convergence_tolerance {
                stop_condition = StopCondition::GradientTolerance;
                break;
            }
            let mut direction = -memory.apply(&g, &self.scales);
            let mut slope = g.dot(&direction);
            if slope >= 0.0 {
                memory.clear();
                direction = -unscale(&g, &self.scales);
                slope = g.dot(&direction);
            }
            let initial_step = if iteration == 0 {
                self.settings.default_step_length / direction.norm().max(1.0)
            } else {
                self.settings.default_step_length
            };
            let Some((x_new, f_new, g_new)) =
                self.line_search(&mut objective, &x, f, slope, &direction, initial_step)?
            else {
                stop_condition = StopCondition::StepTooSmall;
                break;
            };

            memory.push(&x_new - &x, &g_new - &g);
            let change = f - f_new;
            x = x_new;
            f = f_new;
            g = g_new;

            if self.settings.trace {
                tracing::info!(iteration = iteration + 1, value = objective.raw(f), "LBFGS iteration");
            }
            // No stop support: the request flag is never set.
            report(self, observer, &x, objective.raw(f));

            if change.abs() <= 1e-12 * f.abs().max(1.0) {
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
