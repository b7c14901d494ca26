//! (1+1) evolution strategy with an adaptive search ellipsoid.
//!
//! A child is drawn as `parent + A·n` with `n ~ N(0, I)`. The ellipsoid `A`
//! grows along `n` when the child improves and shrinks otherwise; the run
//! ends once its Frobenius norm drops below `epsilon`.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnePlusOneSettings {
    pub shrink_factor: f64,
    pub growth_factor: f64,
    pub epsilon: f64,
    pub initial_radius: f64,
    pub number_of_iterations: usize,
    pub seed: u64,
}

impl Default for OnePlusOneSettings {
    fn default() -> Self {
        let growth_factor: f64 = 1.05;
        Self {
            shrink_factor: growth_factor.powf(-0.25),
            growth_factor,
            epsilon: 1.5e-4,
            initial_radius: 1.01,
            number_of_iterations: 100,
            seed: 121_212,
        }
    }
}

/// Standard normal draw (Box-Muller).
pub(crate) fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

pub struct OnePlusOneEvolutionary {
    settings: OnePlusOneSettings,
    scales: DVector<f64>,
    maximize: bool,
    state: IterationState,
}

impl OnePlusOneEvolutionary {
    pub fn new(settings: OnePlusOneSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self { settings, scales, maximize, state }
    }
}

impl Optimizer for OnePlusOneEvolutionary {
    fn name(&self) -> &'static str {
        "OnePlusOneEvolutionary"
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
        let n = initial.len();
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut objective = Objective::new(cost, self.maximize);
        let mut a = DMatrix::from_diagonal(&self.scales.map(|s| self.settings.initial_radius / s));
        let mut parent = initial;
        let mut parent_value = objective.value(&parent)?;
        let mut stop_condition = StopCondition::MaximumIterations;

        for _ in 0..self.settings.number_of_iterations {
            let sample = DVector::from_fn(n, |_, _| standard_normal(&mut rng));
            let child = &parent + &a * &sample;
            let child_value = objective.value(&child)?;
            let adjust = if child_value < parent_value {
                parent = child;
                parent_value = child_value;
                self.settings.growth_factor
            } else {
                self.settings.shrink_factor
            };

            if a.norm() <= self.settings.epsilon {
                stop_condition = StopCondition::Converged;
                break;
            }
            let sample_norm2 = sample.norm_squared();
            if sample_norm2 > f64::EPSILON {
                let alpha = (adjust - 1.0) / sample_norm2;
                let update = (&a * &sample) * sample.transpose() * alpha;
                a += update;
            }

            if report(self, observer, &parent, objective.raw(parent_value)) {
                stop_condition = StopCondition::UserRequested;
                break;
            }
        }

        Ok(OptimizationOutcome {
            value: objective.raw(parent_value),
            position: parent,
            iterations: self.state.iteration,
            stop_condition,
        })
    }
}
