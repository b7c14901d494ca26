//! Fletcher-Reeves / Polak-Ribière conjugate gradient with line minimization.
//!
//! Directions are built in scaled coordinates (`g / scale`) and mapped back
//! to parameter space before each line search.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::line_search::line_minimize;
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, unscale, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

const VALUE_TOLERANCE: f64 = 1e-6;
const LINE_TOLERANCE: f64 = 1e-6;
const EPS: f64 = 1e-18;

/// Formula for the conjugacy coefficient β.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConjugateUpdate {
    FletcherReeves,
    PolakRibiere,
    /// Polak-Ribière clamped at zero, which restarts on loss of conjugacy.
    PolakRibierePlus,
}

impl ConjugateUpdate {
    pub fn beta(&self, previous: &DVector<f64>, current: &DVector<f64>) -> f64 {
        let gg = previous.dot(previous);
        if gg == 0.0 {
            return 0.0;
        }
        match self {
            Self::FletcherReeves => current.dot(current) / gg,
            Self::PolakRibiere => (current - previous).dot(current) / gg,
            Self::PolakRibierePlus => ((current - previous).dot(current) / gg).max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrprSettings {
    pub use_fletcher_reeves: bool,
    pub step_length: f64,
    pub number_of_iterations: usize,
}

impl Default for FrprSettings {
    fn default() -> Self {
        Self {
            use_fletcher_reeves: false,
            step_length: 1.0,
            number_of_iterations: 100,
        }
    }
}

pub struct FrprOptimizer {
    settings: FrprSettings,
    scales: DVector<f64>,
    maximize: bool,
    state: IterationState,
}

impl FrprOptimizer {
    pub fn new(settings: FrprSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self { settings, scales, maximize, state }
    }

    fn update(&self) -> ConjugateUpdate {
        if self.settings.use_fletcher_reeves {
            ConjugateUpdate::FletcherReeves
        } else {
            ConjugateUpdate::PolakRibiere
        }
    }
}

impl Optimizer for FrprOptimizer {
    fn name(&self) -> &'static str {
        "FRPR"
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
        let update = self.update();
        let mut objective = Objective::new(cost, self.maximize);
        let mut p = initial;
        let (mut fp, gradient) = objective.value_and_gradient(&p)?;
        let mut g = unscale(&gradient, &self.scales);
        let mut h = -g.clone();
        let mut stop_condition = StopCondition::MaximumIterations;

        for _ in 0..self.settings.number_of_iterations {
            let direction = unscale(&h, &self.scales);
            let (_, next, fret) = line_minimize(&mut objective, &p, &direction, self.settings.step_length, LINE_TOLERANCE)?;
            p = next;
            let converged = 2.0 * (fret - fp).abs() <= VALUE_TOLERANCE * (fret.abs() + fp.abs() + EPS);
            fp = fret;

            if report(self, observer, &p, objective.raw(fp)) {
                stop_condition = StopCondition::UserRequested;
                break;
            }
            if converged {
                stop_condition = StopCondition::Converged;
                break;
            }

            let next_g = unscale(&objective.gradient(&p)?, &self.scales);
            if next_g.norm_squared() == 0.0 {
                stop_condition = StopCondition::GradientTolerance;
                break;
            }
            let beta = update.beta(&g, &next_g);
            h = -&next_g + h * beta;
            g = next_g;
        }

        Ok(OptimizationOutcome {
            value: objective.raw(fp),
            position: p,
            iterations: self.state.iteration,
            stop_condition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::objective::FnCost;
    use crate::optimizer::trait_::NoopObserver;

    fn coupled() -> FnCost<impl FnMut(&DVector<f64>) -> Result<f64>> {
        FnCost::new(2, |x: &DVector<f64>| {
            let (a, b) = (x[0] + 1.0, x[1] - 0.5);
            Ok(3.0 * a * a + 2.0 * a * b + b * b)
        })
    }

    #[test]
    fn test_beta_formulas() {
        let previous = DVector::from_vec(vec![1.0, 0.0]);
        let current = DVector::from_vec(vec![0.5, 0.5]);
        assert!((ConjugateUpdate::FletcherReeves.beta(&previous, &current) - 0.5).abs() < 1e-12);
        assert!((ConjugateUpdate::PolakRibiere.beta(&previous, &current) - 0.0).abs() < 1e-12);
        let reversed = DVector::from_vec(vec![0.2, 0.0]);
        assert!(ConjugateUpdate::PolakRibiere.beta(&previous, &reversed) < 0.0);
        assert_eq!(ConjugateUpdate::PolakRibierePlus.beta(&previous, &reversed), 0.0);
    }

    #[test]
    fn test_polak_ribiere_converges() {
        let mut optimizer = FrprOptimizer::new(FrprSettings::default(), DVector::from_element(2, 1.0), false);
        let mut cost = coupled();
        let outcome = optimizer.optimize(&mut cost, DVector::zeros(2), &mut NoopObserver).unwrap();
        assert!((outcome.position[0] + 1.0).abs() < 1e-3);
        assert!((outcome.position[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_fletcher_reeves_converges() {
        let settings = FrprSettings { use_fletcher_reeves: true, ..FrprSettings::default() };
        let mut optimizer = FrprOptimizer::new(settings, DVector::from_element(2, 1.0), false);
        let mut cost = coupled();
        let outcome = optimizer.optimize(&mut cost, DVector::zeros(2), &mut NoopObserver).unwrap();
        assert!((outcome.position[0] + 1.0).abs() < 1e-3);
        assert!((outcome.position[1] - 0.5).abs() < 1e-3);
    }
}
