//! Progress tracking and callbacks for registration runs.
//!
//! The tracker is a step-based sink: the caller declares the expected number
//! of steps up front with [`ProgressTracker::add_steps_to_do`], the observer
//! advances it once per optimizer iteration, and failures force it to
//! completion so an attached indicator never appears stuck.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use crate::observer::StopHandle;

/// One optimizer iteration as seen by the observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub value: f64,
    pub parameters: Vec<f64>,
}

/// Progress information delivered to callbacks.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub record: IterationRecord,
    /// Steps completed so far across all levels.
    pub steps_done: usize,
    /// Steps declared so far.
    pub steps_to_do: usize,
    pub elapsed: Duration,
    pub estimated_remaining: Option<Duration>,
}

impl ProgressInfo {
    pub fn new(record: IterationRecord, steps_done: usize, steps_to_do: usize, elapsed: Duration) -> Self {
        Self {
            record,
            steps_done,
            steps_to_do,
            elapsed,
            estimated_remaining: None,
        }
    }

    /// Calculate progress percentage.
    pub fn progress_percent(&self) -> Option<f64> {
        (self.steps_to_do > 0).then(|| (self.steps_done.min(self.steps_to_do) as f64 / self.steps_to_do as f64) * 100.0)
    }

    /// Calculate estimated remaining time.
    pub fn calculate_remaining(&mut self) {
        if self.steps_done > 0 && self.steps_to_do > 0 {
            let per_step = self.elapsed.as_secs_f64() / self.steps_done as f64;
            let remaining = self.steps_to_do.saturating_sub(self.steps_done);
            self.estimated_remaining = Some(Duration::from_secs_f64(per_step * remaining as f64));
        }
    }
}

/// Progress callback trait for monitoring registration progress.
pub trait ProgressCallback: Send + Sync {
    /// Called once per optimizer iteration.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when a run starts.
    fn on_start(&self) {}

    /// Called when a run completes, with the final iteration.
    fn on_complete(&self, _info: &ProgressInfo) {}

    /// Called when a run fails.
    fn on_error(&self, _error: &str) {}
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log interval (iterations).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 50 }
    }
}

impl ConsoleProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }

    /// Every `log_interval`-th iteration and the last declared step.
    pub fn should_log(&self, info: &ProgressInfo) -> bool {
        info.record.iteration % self.log_interval.max(1) == 0 || info.steps_done == info.steps_to_do
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if self.should_log(info) {
            let remaining = info
                .estimated_remaining
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());

            tracing::info!(
                "Iter {} | step {}/{} ({:.1}%) | Value: {:.6} | Elapsed: {:.2}s | ETA: {}",
                info.record.iteration,
                info.steps_done,
                info.steps_to_do,
                info.progress_percent().unwrap_or(0.0),
                info.record.value,
                info.elapsed.as_secs_f64(),
                remaining
            );
        }
    }

    fn on_start(&self) {
        tracing::info!("Registration started");
    }

    fn on_complete(&self, info: &ProgressInfo) {
        tracing::info!(
            "Registration completed in {:.2}s after {} iterations with final value: {:.6}",
            info.elapsed.as_secs_f64(),
            info.record.iteration,
            info.record.value
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Registration failed: {}", error);
    }
}

/// History callback that records every iteration.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<IterationRecord>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded history.
    pub fn get_history(&self) -> Vec<IterationRecord> {
        lock(&self.history).clone()
    }

    pub fn clear(&self) {
        lock(&self.history).clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        lock(&self.history).push(info.record.clone());
    }
}

/// Requests a cooperative stop once the value stops improving.
#[derive(Debug, Clone)]
pub struct EarlyStoppingCallback {
    /// Minimum improvement to continue.
    pub min_improvement: f64,
    /// Number of iterations to wait for improvement.
    pub patience: usize,
    /// Whether larger values are better.
    pub maximize: bool,
    stop: StopHandle,
    state: Arc<Mutex<(f64, usize)>>,
}

impl EarlyStoppingCallback {
    pub fn new(min_improvement: f64, patience: usize, stop: StopHandle) -> Self {
        Self {
            min_improvement,
            patience,
            maximize: false,
            stop,
            state: Arc::new(Mutex::new((f64::INFINITY, 0))),
        }
    }

    pub fn with_maximize(mut self, maximize: bool) -> Self {
        self.maximize = maximize;
        self
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_set()
    }

    pub fn reset(&self) {
        *lock(&self.state) = (f64::INFINITY, 0);
        self.stop.set(false);
    }
}

impl ProgressCallback for EarlyStoppingCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        let mut state = lock(&self.state);
        let (best, counter) = &mut *state;
        let value = if self.maximize { -info.record.value } else { info.record.value };

        if *best - value > self.min_improvement {
            *best = value;
            *counter = 0;
        } else {
            *counter += 1;
        }

        if *counter >= self.patience && !self.stop.is_set() {
            tracing::info!(
                "Early stopping: no improvement for {} iterations (value: {:.6})",
                self.patience,
                info.record.value
            );
            self.stop.set(true);
        }
    }
}

#[derive(Debug, Default)]
struct Steps {
    to_do: usize,
    done: usize,
    last: Option<IterationRecord>,
}

/// Progress tracker that manages multiple callbacks and the step counter.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Arc<Mutex<Option<Instant>>>,
    steps: Arc<Mutex<Steps>>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("callbacks", &self.callbacks.len())
            .field("steps", &*lock(&self.steps))
            .finish()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    /// Start tracking.
    pub fn start(&self) {
        *lock(&self.start_time) = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_start();
        }
    }

    /// Declare `steps` more expected steps.
    pub fn add_steps_to_do(&self, steps: usize) {
        lock(&self.steps).to_do += steps;
    }

    /// Advance the step counter by `steps`.
    pub fn progress(&self, steps: usize) {
        lock(&self.steps).done += steps;
    }

    pub fn steps_done(&self) -> usize {
        lock(&self.steps).done
    }

    pub fn steps_to_do(&self) -> usize {
        lock(&self.steps).to_do
    }

    /// Jump the counter to the declared total.
    pub fn force_complete(&self) {
        let mut counter = lock(&self.steps);
        counter.done = counter.done.max(counter.to_do);
    }

    /// Deliver one iteration to every callback.
    pub fn record(&self, record: IterationRecord) {
        let info = {
            let mut steps = lock(&self.steps);
            steps.last = Some(record.clone());
            self.info(record, &steps)
        };
        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    /// Complete tracking.
    pub fn complete(&self) {
        let info = {
            let steps = lock(&self.steps);
            let last = steps.last.clone().unwrap_or(IterationRecord {
                iteration: 0,
                value: 0.0,
                parameters: Vec::new(),
            });
            self.info(last, &steps)
        };
        for callback in &self.callbacks {
            callback.on_complete(&info);
        }
    }

    /// Report an error and force the counter to completion.
    pub fn error(&self, error: &str) {
        self.force_complete();
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }

    fn info(&self, record: IterationRecord, steps: &Steps) -> ProgressInfo {
        let start_time = *lock(&self.start_time);
        let elapsed = start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
        let mut info = ProgressInfo::new(record, steps.done, steps.to_do, elapsed);
        info.calculate_remaining();
        info
    }
}

/// Lock a mutex, recovering the data if a callback panicked while holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(iteration: usize, value: f64) -> IterationRecord {
        IterationRecord {
            iteration,
            value,
            parameters: vec![value],
        }
    }

    #[test]
    fn test_progress_info() {
        let info = ProgressInfo::new(record(10, 0.5), 10, 100, Duration::from_secs(10));
        assert_eq!(info.record.iteration, 10);
        assert_eq!(info.progress_percent(), Some(10.0));
    }

    #[test]
    fn test_progress_info_remaining() {
        let mut info = ProgressInfo::new(record(10, 0.5), 10, 100, Duration::from_secs(10));
        info.calculate_remaining();
        let remaining = info.estimated_remaining.unwrap();
        assert!((remaining.as_secs_f64() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_step_counter_and_force_complete() {
        let tracker = ProgressTracker::new();
        tracker.add_steps_to_do(10);
        tracker.add_steps_to_do(5);
        tracker.progress(1);
        tracker.progress(2);
        assert_eq!(tracker.steps_done(), 3);
        assert_eq!(tracker.steps_to_do(), 15);
        tracker.error("boom");
        assert_eq!(tracker.steps_done(), 15);
    }

    #[test]
    fn test_console_callback_log_interval() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        assert_eq!(ConsoleProgressCallback::default().log_interval, 50);
        assert_eq!(ConsoleProgressCallback::new(0).log_interval, 1);

        let console = ConsoleProgressCallback::new(10);
        let info = |i: usize| ProgressInfo::new(record(i, 1.0), i, 25, Duration::from_secs(1));
        assert!(console.should_log(&info(10)));
        assert!(console.should_log(&info(20)));
        assert!(!console.should_log(&info(7)));
        assert!(console.should_log(&info(25)));

        let tracker = ProgressTracker::new().with_callback(Arc::new(console));
        tracker.add_steps_to_do(25);
        tracker.start();
        tracker.progress(1);
        tracker.record(record(1, 0.5));
        tracker.complete();
        tracker.error("lost the moving image");
        assert_eq!(tracker.steps_done(), 25);
    }

    #[test]
    fn test_history_callback() {
        let history = Arc::new(HistoryCallback::new());
        let tracker = ProgressTracker::new().with_callback(history.clone());
        tracker.start();
        tracker.record(record(1, 0.5));
        tracker.record(record(2, 0.4));
        tracker.complete();

        let recorded = history.get_history();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].iteration, 1);
        assert_eq!(recorded[1].value, 0.4);
    }

    #[test]
    fn test_early_stopping_sets_stop_handle() {
        let handle = StopHandle::new();
        let callback = EarlyStoppingCallback::new(0.01, 3, handle.clone());
        let info = |i: usize, v: f64| ProgressInfo::new(record(i, v), i, 10, Duration::ZERO);

        callback.on_progress(&info(1, 1.0));
        callback.on_progress(&info(2, 0.9));
        callback.on_progress(&info(3, 0.8));
        assert!(!handle.is_set());

        callback.on_progress(&info(4, 0.8));
        callback.on_progress(&info(5, 0.8));
        callback.on_progress(&info(6, 0.8));
        assert!(handle.is_set());
        assert!(callback.should_stop());
    }
}
