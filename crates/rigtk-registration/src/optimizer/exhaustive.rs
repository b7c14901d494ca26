//! Exhaustive grid search.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::{RegistrationError, Result};
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

pub(crate) const MAX_GRID_POINTS: usize = 10_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhaustiveSettings {
    pub step_length: f64,
    /// Steps on each side of the initial position, per parameter.
    pub number_of_steps: usize,
}

impl Default for ExhaustiveSettings {
    fn default() -> Self {
        Self {
            step_length: 1.0,
            number_of_steps: 0,
        }
    }
}

/// Visits `init + (k - n) * step / scale` for every `k` in `0..=2n` on every axis.
///
/// Every evaluation is reported as one iteration; stop requests are ignored.
pub struct ExhaustiveOptimizer {
    settings: ExhaustiveSettings,
    scales: DVector<f64>,
    maximize: bool,
    state: IterationState,
}

impl ExhaustiveOptimizer {
    pub fn new(settings: ExhaustiveSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self { settings, scales, maximize, state }
    }

    fn grid_size(&self) -> Result<usize> {
        let per_axis = 2 * self.settings.number_of_steps + 1;
        let mut total = 1usize;
        for _ in 0..self.scales.len() {
            total = total
                .checked_mul(per_axis)
                .filter(|&t| t <= MAX_GRID_POINTS)
                .ok_or_else(|| {
                    RegistrationError::invalid_configuration(format!(
                        "exhaustive grid with {per_axis} points per axis over {} parameters is too large",
                        self.scales.len()
                    ))
                })?;
        }
        Ok(total)
    }
}

impl Optimizer for ExhaustiveOptimizer {
    fn name(&self) -> &'static str {
        "Exhaustive"
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
        let total = self.grid_size()?;
        let per_axis = 2 * self.settings.number_of_steps + 1;
        let n = self.settings.number_of_steps as f64;
        let mut objective = Objective::new(cost, self.maximize);

        let mut best: Option<(f64, DVector<f64>)> = None;
        let mut point = initial.clone();
        for flat in 0..total {
            let mut rem = flat;
            for i in 0..point.len() {
                let k = (rem % per_axis) as f64;
                rem /= per_axis;
                point[i] = initial[i] + (k - n) * self.settings.step_length / self.scales[i];
            }
            let value = objective.value(&point)?;
            if best.as_ref().map_or(true, |(b, _)| value < *b) {
                best = Some((value, point.clone()));
            }
            // No stop support: the request flag is never set.
            report(self, observer, &point, objective.raw(value));
        }

        let (value, position) = best.unwrap_or_else(|| (f64::INFINITY, initial));
        Ok(OptimizationOutcome {
            value: objective.raw(value),
            position,
            iterations: self.state.iteration,
            stop_condition: StopCondition::SearchComplete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::objective::FnCost;
    use crate::optimizer::trait_::NoopObserver;

    #[test]
    fn test_finds_grid_minimum() {
        let settings = ExhaustiveSettings { step_length: 0.5, number_of_steps: 4 };
        let mut optimizer = ExhaustiveOptimizer::new(settings, DVector::from_element(2, 1.0), false);
        let mut cost = FnCost::new(2, |x: &DVector<f64>| Ok((x[0] - 1.0).powi(2) + (x[1] + 0.5).powi(2)));
        let outcome = optimizer
            .optimize(&mut cost, DVector::zeros(2), &mut NoopObserver)
            .unwrap();
        assert_eq!(outcome.iterations, 81);
        assert_eq!(outcome.stop_condition, StopCondition::SearchComplete);
        assert!((outcome.position[0] - 1.0).abs() < 1e-12);
        assert!((outcome.position[1] + 0.5).abs() < 1e-12);
        assert!(outcome.value.abs() < 1e-12);
    }

    #[test]
    fn test_scales_shrink_grid_spacing() {
        let settings = ExhaustiveSettings { step_length: 1.0, number_of_steps: 1 };
        let mut optimizer = ExhaustiveOptimizer::new(settings, DVector::from_element(1, 4.0), true);
        let mut visited = Vec::new();
        let mut cost = FnCost::new(1, |x: &DVector<f64>| Ok(x[0]));
        let mut observer = |opt: &mut dyn Optimizer| visited.push(opt.current_parameters()[0]);
        let outcome = optimizer.optimize(&mut cost, DVector::zeros(1), &mut observer).unwrap();
        assert_eq!(visited, vec![-0.25, 0.0, 0.25]);
        assert!((outcome.value - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_oversized_grid_is_rejected() {
        let settings = ExhaustiveSettings { step_length: 1.0, number_of_steps: 50 };
        let mut optimizer = ExhaustiveOptimizer::new(settings, DVector::from_element(6, 1.0), false);
        let mut cost = FnCost::new(6, |_: &DVector<f64>| Ok(0.0));
        let err = optimizer.optimize(&mut cost, DVector::zeros(6), &mut NoopObserver).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
    }
}
