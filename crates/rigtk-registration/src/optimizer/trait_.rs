//! Optimizer trait shared by every optimizer family.
//!
//! The registration observer reads the current value and parameters of any
//! optimizer through this trait and asks it to stop cooperatively. Families
//! without a native stop hook return `false` from [`Optimizer::try_request_stop`]
//! and run to their natural termination.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::objective::CostFunction;

/// Why an optimization run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopCondition {
    /// Value or parameter change fell below the configured tolerance.
    Converged,
    /// The iteration cap was reached.
    MaximumIterations,
    /// The step length shrank below its minimum.
    StepTooSmall,
    /// The (projected) gradient magnitude fell below its tolerance.
    GradientTolerance,
    /// A cooperative stop was requested through the observer.
    UserRequested,
    /// An exhaustive search visited every grid point.
    SearchComplete,
}

/// Result of a finished optimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationOutcome {
    pub position: DVector<f64>,
    /// Raw metric value at `position`.
    pub value: f64,
    pub iterations: usize,
    pub stop_condition: StopCondition,
}

/// Mutable state every optimizer exposes to its observer.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationState {
    pub position: DVector<f64>,
    pub value: f64,
    pub iteration: usize,
    pub stop_requested: bool,
}

impl IterationState {
    pub fn new(parameter_count: usize) -> Self {
        Self {
            position: DVector::zeros(parameter_count),
            value: 0.0,
            iteration: 0,
            stop_requested: false,
        }
    }
}

/// Receives one notification per accepted optimizer iteration.
pub trait IterationObserver {
    fn execute(&mut self, optimizer: &mut dyn Optimizer);
}

impl<F> IterationObserver for F
where
    F: FnMut(&mut dyn Optimizer),
{
    fn execute(&mut self, optimizer: &mut dyn Optimizer) {
        self(optimizer)
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl IterationObserver for NoopObserver {
    fn execute(&mut self, _optimizer: &mut dyn Optimizer) {}
}

/// Common interface of all optimizer families.
pub trait Optimizer {
    /// Family name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the family honours cooperative stop requests.
    fn supports_stop(&self) -> bool;

    fn state(&self) -> &IterationState;

    fn state_mut(&mut self) -> &mut IterationState;

    /// Value reported with the last iteration.
    fn current_value(&self) -> f64 {
        self.state().value
    }

    /// Parameters reported with the last iteration.
    fn current_parameters(&self) -> &DVector<f64> {
        &self.state().position
    }

    fn current_iteration(&self) -> usize {
        self.state().iteration
    }

    /// Ask the optimizer to stop at the next iteration boundary.
    ///
    /// Returns whether the request has any effect.
    fn try_request_stop(&mut self) -> bool {
        if self.supports_stop() {
            self.state_mut().stop_requested = true;
            tracing::debug!(optimizer = self.name(), "stop requested");
            true
        } else {
            tracing::warn!(
                optimizer = self.name(),
                "optimizer has no stop support; request ignored until natural termination"
            );
            false
        }
    }

    /// Run the optimization from `initial`, notifying `observer` once per iteration.
    fn optimize(
        &mut self,
        cost: &mut dyn CostFunction,
        initial: DVector<f64>,
        observer: &mut dyn IterationObserver,
    ) -> Result<OptimizationOutcome>;
}

/// Publish one iteration and notify the observer.
///
/// Returns `true` when a stop was requested and the loop must end.
pub(crate) fn report<O: Optimizer>(
    optimizer: &mut O,
    observer: &mut dyn IterationObserver,
    position: &DVector<f64>,
    value: f64,
) -> bool {
    {
        let state = optimizer.state_mut();
        state.position.clone_from(position);
        state.value = value;
        state.iteration += 1;
    }
    tracing::debug!(
        optimizer = optimizer.name(),
        iteration = optimizer.current_iteration(),
        value,
        "iteration"
    );
    observer.execute(optimizer);
    optimizer.state().stop_requested
}

/// Reset the published state before a run.
pub(crate) fn begin<O: Optimizer>(optimizer: &mut O, initial: &DVector<f64>) {
    let state = optimizer.state_mut();
    state.position.clone_from(initial);
    state.value = 0.0;
    state.iteration = 0;
    state.stop_requested = false;
}

/// Divide every component by its scale.
pub(crate) fn unscale(vector: &DVector<f64>, scales: &DVector<f64>) -> DVector<f64> {
    vector.component_div(scales)
}
