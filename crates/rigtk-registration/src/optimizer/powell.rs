//! Powell's direction-set method.
//!
//! Starting directions are the coordinate axes divided by their scales. Each
//! outer iteration runs one line minimization per direction, then possibly
//! swaps the direction of largest decrease for the average displacement.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::line_search::line_minimize;
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

const TINY: f64 = 1e-25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowellSettings {
    /// Initial bracketing step of every line search.
    pub step_length: f64,
    /// Relative tolerance of the line minimizations.
    pub step_tolerance: f64,
    /// Relative value decrease below which the run has converged.
    pub value_tolerance: f64,
    pub number_of_iterations: usize,
}

impl Default for PowellSettings {
    fn default() -> Self {
        Self {
            step_length: 1.0,
            step_tolerance: 1e-6,
            value_tolerance: 1e-6,
            number_of_iterations: 100,
        }
    }
}

pub struct PowellOptimizer {
    settings: PowellSettings,
    scales: DVector<f64>,
    maximize: bool,
    state: IterationState,
}

impl PowellOptimizer {
    pub fn new(settings: PowellSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self { settings, scales, maximize, state }
    }
}

impl Optimizer for PowellOptimizer {
    fn name(&self) -> &'static str {
        "Powell"
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
        let step = self.settings.step_length;
        let tolerance = self.settings.step_tolerance;
        let mut objective = Objective::new(cost, self.maximize);
        let mut directions: Vec<DVector<f64>> = (0..n)
            .map(|i| {
                let mut d = DVector::zeros(n);
                d[i] = 1.0 / self.scales[i];
                d
            })
            .collect();

        let mut p = initial;
        let mut fret = objective.value(&p)?;
        let mut anchor = p.clone();
        let mut stop_condition = StopCondition::MaximumIterations;

        for _ in 0..self.settings.number_of_iterations {
            let fp = fret;
            let mut biggest = 0;
            let mut biggest_decrease = 0.0;
            for (i, direction) in directions.iter().enumerate() {
                let before = fret;
                let (_, next, value) = line_minimize(&mut objective, &p, direction, step, tolerance)?;
                p = next;
                fret = value;
                if before - fret > biggest_decrease {
                    biggest_decrease = before - fret;
                    biggest = i;
                }
            }

            let converged =
                2.0 * (fp - fret) <= self.settings.value_tolerance * (fp.abs() + fret.abs()) + TINY;
            if !converged {
                let extrapolated = &p * 2.0 - &anchor;
                let average = &p - &anchor;
                let fe = objective.value(&extrapolated)?;
                if fe < fp {
                    let t = 2.0 * (fp - 2.0 * fret + fe) * (fp - fret - biggest_decrease).powi(2)
                        - biggest_decrease * (fp - fe).powi(2);
                    if t < 0.0 {
                        let (_, next, value) = line_minimize(&mut objective, &p, &average, 1.0, tolerance)?;
                        p = next;
                        fret = value;
                        directions.swap_remove(biggest);
                        directions.push(average);
                    }
                }
            }
            anchor = p.clone();

            if report(self, observer, &p, objective.raw(fret)) {
                stop_condition = StopCondition::UserRequested;
                break;
            }
            if converged {
                stop_condition = StopCondition::Converged;
                break;
            }
        }

        Ok(OptimizationOutcome {
            value: objective.raw(fret),
            position: p,
            iterations: self.state.iteration,
            stop_condition,
        })
    }
}
