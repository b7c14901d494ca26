//! Nelder-Mead downhill simplex.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::{RegistrationError, Result};
use super::objective::{CostFunction, Objective};
use super::trait_::{begin, report, IterationObserver, IterationState, OptimizationOutcome, Optimizer, StopCondition};

const RELATIVE_DIAMETER: f64 = 0.05;
const ZERO_TERM_DELTA: f64 = 0.00025;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmoebaSettings {
    /// Initial simplex extent per parameter; `None` derives it from the start point.
    pub simplex_delta: Option<Vec<f64>>,
    pub parameters_convergence_tolerance: f64,
    pub function_convergence_tolerance: f64,
    pub number_of_iterations: usize,
}

impl Default for AmoebaSettings {
    fn default() -> Self {
        Self {
            simplex_delta: None,
            parameters_convergence_tolerance: 1e-8,
            function_convergence_tolerance: 1e-4,
            number_of_iterations: 500,
        }
    }
}

pub struct AmoebaOptimizer {
    settings: AmoebaSettings,
    scales: DVector<f64>,
    maximize: bool,
    state: IterationState,
}

struct Vertex {
    point: DVector<f64>,
    value: f64,
}

impl AmoebaOptimizer {
    pub fn new(settings: AmoebaSettings, scales: DVector<f64>, maximize: bool) -> Self {
        let state = IterationState::new(scales.len());
        Self { settings, scales, maximize, state }
    }

    fn deltas(&self, initial: &DVector<f64>) -> Result<DVector<f64>> {
        match &self.settings.simplex_delta {
            Some(delta) if delta.len() != initial.len() => Err(RegistrationError::invalid_configuration(format!(
                "simplex delta has {} entries, expected {}",
                delta.len(),
                initial.len()
            ))),
            Some(delta) => Ok(DVector::from_column_slice(delta).component_div(&self.scales)),
            None => Ok(initial.map(|x| if x == 0.0 { ZERO_TERM_DELTA } else { RELATIVE_DIAMETER * x.abs() })),
        }
    }

    fn converged(&self, simplex: &[Vertex]) -> bool {
        let best = &simplex[0];
        simplex[1..].iter().all(|v| {
            (&v.point - &best.point).amax() <= self.settings.parameters_convergence_tolerance
                && (v.value - best.value).abs() <= self.settings.function_convergence_tolerance
        })
    }
}

fn sort(simplex: &mut [Vertex]) {
    simplex.sort_by(|a, b| a.value.total_cmp(&b.value));
}

impl Optimizer for AmoebaOptimizer {
    fn name(&self) -> &'static str {
        "Amoeba"
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
        let n = initial.len();
        let deltas = self.deltas(&initial)?;
        let mut objective = Objective::new(cost, self.maximize);

        let mut simplex = Vec::with_capacity(n + 1);
        simplex.push(Vertex { value: objective.value(&initial)?, point: initial.clone() });
        for i in 0..n {
            let mut point = initial.clone();
            point[i] += deltas[i];
            simplex.push(Vertex { value: objective.value(&point)?, point });
        }
        sort(&mut simplex);
        let mut stop_condition = StopCondition::MaximumIterations;

        for _ in 0..self.settings.number_of_iterations {
            if self.converged(&simplex) {
                stop_condition = StopCondition::Converged;
                break;
            }
            let worst = n;
            let centroid = simplex[..n]
                .iter()
                .fold(DVector::zeros(n), |acc, v| acc + &v.point)
                / n as f64;
            let toward = |t: f64| &centroid + (&simplex[worst].point - &centroid) * t;

            let reflected = toward(-1.0);
            let fr = objective.value(&reflected)?;
            if fr < simplex[0].value {
                let expanded = toward(-2.0);
                let fe = objective.value(&expanded)?;
                simplex[worst] = if fe < fr {
                    Vertex { point: expanded, value: fe }
                } else {
                    Vertex { point: reflected, value: fr }
                };
            } else if fr < simplex[n - 1].value {
                simplex[worst] = Vertex { point: reflected, value: fr };
            } else {
                let outside = fr < simplex[worst].value;
                let contracted = if outside { toward(-0.5) } else { toward(0.5) };
                let fc = objective.value(&contracted)?;
                let limit = if outside { fr } else { simplex[worst].value };
                if fc < limit {
                    simplex[worst] = Vertex { point: contracted, value: fc };
                } else {
                    let best = simplex[0].point.clone();
                    for vertex in simplex.iter_mut().skip(1) {
                        vertex.point = &best + (&vertex.point - &best) * 0.5;
                        vertex.value = objective.value(&vertex.point)?;
                    }
                }
            }
            sort(&mut simplex);
            // No stop support: the request flag is never set.
            report(self, observer, &simplex[0].point, objective.raw(simplex[0].value));
        }

        let best = simplex.swap_remove(0);
        Ok(OptimizationOutcome {
            value: objective.raw(best.value),
            position: best.point,
            iterations: self.state.iteration,
            stop_condition,
        })
    }
}
