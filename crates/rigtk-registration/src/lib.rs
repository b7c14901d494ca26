//! Rigid and affine image registration.
//!
//! An [`ImageRegistrationMethod`] (or its coarse-to-fine counterpart
//! [`PyramidalRegistrationMethod`]) searches the parameters of a
//! [`TransformFamily`](rigtk_core::TransformFamily) that align a moving
//! image with a fixed one under a similarity metric. A
//! [`RegistrationObserver`] sees every iteration and can request a
//! cooperative stop. The converged result is applied to placements with
//! [`apply_registration`] and can be undone through a
//! [`TransformationHistory`].

pub mod error;
pub mod validation;
pub mod parameters;
pub mod metric;
pub mod optimizer;
pub mod progress;
pub mod observer;
pub mod cost;
pub mod registration;
pub mod multires;
pub mod bridge;
pub mod apply;
pub mod history;
pub mod preset;

pub use error::{RegistrationError, Result};
pub use parameters::{
    Initializer, MetricFamily, MetricParameters, OptimizerFamily, OptimizerParameters, SampleSelection,
    TransformParameters,
};
pub use progress::{
    ConsoleProgressCallback, EarlyStoppingCallback, HistoryCallback, IterationRecord, ProgressCallback, ProgressInfo,
    ProgressTracker,
};
pub use observer::{RegistrationObserver, StopHandle};
pub use optimizer::{Optimizer, StopCondition};
pub use registration::{ImageRegistrationMethod, LevelSummary, RegistrationResult};
pub use multires::PyramidalRegistrationMethod;
pub use apply::{apply_registration, registration_matrix, AppliedRegistration, ChildPlacement};
pub use history::{PlacementSnapshot, TransformationHistory};
pub use preset::{PresetLibrary, RegistrationPreset};
