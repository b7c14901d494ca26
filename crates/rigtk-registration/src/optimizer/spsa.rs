//! Simultaneous perturbation stochastic approximation.
//!
//! Each iteration estimates the gradient from two evaluations per random
//! ±1 perturbation, with gains `a_k = a / (A + k + 1)^alpha` and
//! `c_k = c / (k + 1)^gamma`. A decaying "state of convergence"
//! accumulates `a_k·|g|`; the run converges once it drops below the
//! tolerance after the minimum number of iterations.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpsaSettings {
    pub a: f64,
    pub big_a: f64,
    pub alpha: f64,
    pub c: f64,
    pub gamma: f64,
    pub tolerance: f64,
    pub decay_rate: f64,
    pub minimum_iterations: usize,
    pub number_of_perturbations: usize,
    pub number_of_iterations: usize,
    pub seed: u64,
}

impl Default for SpsaSettings {
    fn default() -> Self {
        Self {
            a: 1.0,
            big_a: 10.0,
            alpha: 0.602,
            c: 1e-4,
            gamma: 0.101,
            tolerance: 1e-6,
            decay_rate: 0.9,
            minimum_iterations: 10,
            number_of_perturbations: 1,
            number_of_iterations: 100,
            seed: 121_212,
        }
    }
}

impl SpsaSettings {
    pub fn gain_a(&self, k: usize) -> f64 {
        self.a / (self.big_a + k as f64 + 1.0).powf(self.alpha)
    }

    pub fn gain_c(&self, k: usize) -> f64 {
        self.c / (k as f64 + 1.0).powf(self.gamma)
    }
}

pub struct SpsaOptimizer {
    settings: SpsaSettings,
    scales: DVector<f64>,
    maximize: bool,
    state_of_convergence: f64,
    state: IterationState,
}

impl SpsaOptimizer {
    pub fn new(settings: SpsaSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self {
            settings,
            scales,
            maximize,
            state_of_convergence: 0.0,
            state,
        }
    }

    pub fn state_of_convergence(&self) -> f64 {
        self.state_of_convergence
    }

    fn estimate_gradient(
        &self,
        objective: &mut Objective<'_>,
        rng: &mut StdRng,
        x: &DVector<f64>,
        ck: f64,
    ) -> Result<DVector<f64>> {
        let n = x.len();
        let perturbations = self.settings.number_of_perturbations.max(1);
        let mut gradient = DVector::zeros(n);
        for _ in 0..perturbations {
            let delta = DVector::from_fn(n, |j, _| {
                let sign = if rng.random::<bool>() { 1.0 } else { -1.0 };
                sign / self.scales[j]
            });
            let plus = objective.value(&(x + &delta * ck))?;
            let minus = objective.value(&(x - &delta * ck))?;
            let difference = (plus - minus) / (2.0 * ck);
            gradient += delta.map(|d| difference / d);
        }
        Ok(gradient / perturbations as f64)
    }
}

impl Optimizer for SpsaOptimizer {
    fn name(&self) -> &'static str {
        "SPSA"
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
        self.state_of_convergence = 0.0;
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut objective = Objective::new(cost, self.maximize);
        let mut x = initial;
        let mut stop_condition = StopCondition::MaximumIterations;

        for k in 0..self.settings.number_of_iterations {
            let ak = self.settings.gain_a(k);
            let ck = self.settings.gain_c(k);
            let gradient = self.estimate_gradient(&mut objective, &mut rng, &x, ck)?;
            x -= &gradient * ak;
            self.state_of_convergence =
                self.settings.decay_rate * self.state_of_convergence + ak * gradient.norm();
            let value = objective.value(&x)?;

            if report(self, observer, &x, objective.raw(value)) {
                stop_condition = StopCondition::UserRequested;
                break;
            }
            if k + 1 >= self.settings.minimum_iterations && self.state_of_convergence < self.settings.tolerance {
                stop_condition = StopCondition::Converged;
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
