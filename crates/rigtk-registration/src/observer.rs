//! Registration observer.
//!
//! The observer is attached to every optimizer run. On each iteration it
//! reads the optimizer's value and parameters through the [`Optimizer`]
//! trait, forwards them to the progress tracker, and forwards a pending stop
//! request. It runs on the optimizer's thread; only the stop flag may be
//! touched from elsewhere, through a [`StopHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use crate::optimizer::{IterationObserver, Optimizer};
use crate::progress::{IterationRecord, ProgressTracker};

/// Shared cooperative-cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, stop: bool) {
        self.0.store(stop, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct RegistrationObserver {
    current_value: f64,
    current_parameters: Vec<f64>,
    iterations: usize,
    stop: StopHandle,
    stop_ignored: bool,
    progress: ProgressTracker,
}

impl RegistrationObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Value recorded at the last iteration.
    pub fn current_optimizer_value(&self) -> f64 {
        self.current_value
    }

    /// Full parameter vector recorded at the last iteration.
    pub fn current_translation(&self) -> &[f64] {
        &self.current_parameters
    }

    /// Iterations observed since construction, across all levels.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn set_stop_optimization(&self, stop: bool) {
        self.stop.set(stop);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_set()
    }

    /// A handle that can set the stop flag from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Forget that the previous optimizer ignored a stop request.
    pub(crate) fn begin_run(&mut self) {
        self.stop_ignored = false;
    }
}

impl IterationObserver for RegistrationObserver {
    fn execute(&mut self, optimizer: &mut dyn Optimizer) {
        self.current_value = optimizer.current_value();
        self.current_parameters = optimizer.current_parameters().iter().copied().collect();
        self.iterations += 1;

        self.progress.progress(1);
        self.progress.record(IterationRecord {
            iteration: optimizer.current_iteration(),
            value: self.current_value,
            parameters: self.current_parameters.clone(),
        });

        if self.stop.is_set() && !self.stop_ignored {
            self.stop_ignored = !optimizer.try_request_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;
    use crate::optimizer::{
        AmoebaOptimizer, AmoebaSettings, FnCost, RegularStepGradientDescent, RegularStepSettings, StepRule,
    };

    fn bowl() -> FnCost<impl FnMut(&DVector<f64>) -> crate::error::Result<f64>> {
        FnCost::new(2, |x: &DVector<f64>| Ok((x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2)))
    }

    #[test]
    fn test_records_value_and_parameters() {
        let mut observer = RegistrationObserver::new();
        let mut optimizer = RegularStepGradientDescent::new(
            RegularStepSettings::default(),
            DVector::from_element(2, 1.0),
            false,
            StepRule::Additive,
        );
        let outcome = optimizer
            .optimize(&mut bowl(), DVector::zeros(2), &mut observer)
            .unwrap();
        assert_eq!(observer.iterations(), outcome.iterations);
        assert_eq!(observer.current_translation().len(), 2);
        assert_eq!(observer.progress().steps_done(), outcome.iterations);
    }

    #[test]
    fn test_stop_from_another_thread() {
        let observer = RegistrationObserver::new();
        let handle = observer.stop_handle();
        std::thread::spawn(move || handle.set(true)).join().unwrap();
        assert!(observer.stop_requested());
    }

    #[test]
    fn test_stop_is_honoured_at_next_boundary() {
        let mut observer = RegistrationObserver::new();
        observer.set_stop_optimization(true);
        let mut optimizer = RegularStepGradientDescent::new(
            RegularStepSettings::default(),
            DVector::from_element(2, 1.0),
            false,
            StepRule::Additive,
        );
        let outcome = optimizer
            .optimize(&mut bowl(), DVector::zeros(2), &mut observer)
            .unwrap();
        assert_eq!(outcome.iterations, 1);
        assert_eq!(observer.iterations(), 1);
    }

    #[test]
    fn test_stop_is_ignored_without_support() {
        let mut observer = RegistrationObserver::new();
        observer.set_stop_optimization(true);
        let mut optimizer = AmoebaOptimizer::new(AmoebaSettings::default(), DVector::from_element(2, 1.0), false);
        optimizer
            .optimize(&mut bowl(), DVector::zeros(2), &mut observer)
            .unwrap();
        assert!(observer.iterations() > 1);
    }
}
